use std::collections::HashSet;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Started,
    Completed,
    Failed,
}

impl ReviewState {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewState::Started => "started",
            ReviewState::Completed => "completed",
            ReviewState::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "started" => Some(Self::Started),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    InProgress,
    Completed,
    Failed,
}

/// Where an item came from. Local items are optimistic echoes of a user action that an
/// authoritative remote item may later supersede; `correlation_id` links the two.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ItemOrigin {
    Local {
        #[serde(default)]
        correlation_id: Option<String>,
    },
    Remote {
        #[serde(default)]
        correlation_id: Option<String>,
    },
}

impl ItemOrigin {
    pub fn local() -> Self {
        Self::Local {
            correlation_id: None,
        }
    }

    pub fn remote() -> Self {
        Self::Remote {
            correlation_id: None,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local { .. })
    }

    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Self::Local { correlation_id } | Self::Remote { correlation_id } => {
                correlation_id.as_deref()
            }
        }
    }
}

impl Default for ItemOrigin {
    fn default() -> Self {
        Self::remote()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ItemKind {
    Message,
    Reasoning,
    Tool,
    Review,
    Diff,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Message => "message",
            ItemKind::Reasoning => "reasoning",
            ItemKind::Tool => "tool",
            ItemKind::Review => "review",
            ItemKind::Diff => "diff",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversationItem {
    Message {
        id: String,
        role: MessageRole,
        text: String,
    },
    Reasoning {
        id: String,
        summary: String,
        content: String,
    },
    Tool {
        id: String,
        #[serde(default)]
        title: String,
        #[serde(default)]
        detail: String,
        status: ToolStatus,
        #[serde(default)]
        output: String,
    },
    Review {
        id: String,
        state: ReviewState,
        #[serde(default)]
        text: String,
        #[serde(default)]
        origin: ItemOrigin,
    },
    Diff {
        id: String,
        title: String,
        diff: String,
        status: ToolStatus,
    },
}

impl ConversationItem {
    pub fn id(&self) -> &str {
        match self {
            ConversationItem::Message { id, .. }
            | ConversationItem::Reasoning { id, .. }
            | ConversationItem::Tool { id, .. }
            | ConversationItem::Review { id, .. }
            | ConversationItem::Diff { id, .. } => id,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            ConversationItem::Message { .. } => ItemKind::Message,
            ConversationItem::Reasoning { .. } => ItemKind::Reasoning,
            ConversationItem::Tool { .. } => ItemKind::Tool,
            ConversationItem::Review { .. } => ItemKind::Review,
            ConversationItem::Diff { .. } => ItemKind::Diff,
        }
    }

    pub fn is_user_message(&self) -> bool {
        matches!(
            self,
            ConversationItem::Message {
                role: MessageRole::User,
                ..
            }
        )
    }

    fn is_pending_local_review_start(&self) -> bool {
        matches!(
            self,
            ConversationItem::Review {
                state: ReviewState::Started,
                origin: ItemOrigin::Local { .. },
                ..
            }
        )
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReasoningField {
    Summary,
    Content,
}

fn item_index(items: &[ConversationItem], item_id: &str) -> Option<usize> {
    items.iter().position(|item| item.id() == item_id)
}

pub(crate) fn find_item<'a>(
    items: &'a [ConversationItem],
    item_id: &str,
) -> Option<&'a ConversationItem> {
    items.iter().find(|item| item.id() == item_id)
}

pub(crate) fn has_user_message(items: &[ConversationItem]) -> bool {
    items.iter().any(ConversationItem::is_user_message)
}

/// Returns an id derived from `base` that is not taken yet in `items`.
pub(crate) fn unique_item_id(items: &[ConversationItem], base: &str) -> String {
    if item_index(items, base).is_none() {
        return base.to_owned();
    }
    let mut suffix = 2u32;
    loop {
        let candidate = format!("{base}-{suffix}");
        if item_index(items, &candidate).is_none() {
            return candidate;
        }
        suffix += 1;
    }
}

pub(crate) fn push_item(items: &mut Arc<Vec<ConversationItem>>, item: ConversationItem) {
    Arc::make_mut(items).push(item);
}

/// Appends streamed assistant text. Returns the accumulated text when the store changed.
pub(crate) fn append_message_delta(
    items: &mut Arc<Vec<ConversationItem>>,
    item_id: &str,
    delta: &str,
) -> Option<String> {
    if delta.is_empty() {
        return None;
    }
    match item_index(items, item_id) {
        None => {
            push_item(
                items,
                ConversationItem::Message {
                    id: item_id.to_owned(),
                    role: MessageRole::Assistant,
                    text: delta.to_owned(),
                },
            );
            Some(delta.to_owned())
        }
        Some(idx) => {
            if !matches!(items[idx], ConversationItem::Message { .. }) {
                return None;
            }
            match &mut Arc::make_mut(items)[idx] {
                ConversationItem::Message { text, .. } => {
                    text.push_str(delta);
                    Some(text.clone())
                }
                _ => None,
            }
        }
    }
}

/// Replaces the text of an assistant message with its final form.
pub(crate) fn complete_message(
    items: &mut Arc<Vec<ConversationItem>>,
    item_id: &str,
    final_text: &str,
) -> bool {
    match item_index(items, item_id) {
        None => {
            push_item(
                items,
                ConversationItem::Message {
                    id: item_id.to_owned(),
                    role: MessageRole::Assistant,
                    text: final_text.to_owned(),
                },
            );
            true
        }
        Some(idx) => {
            match &items[idx] {
                ConversationItem::Message { text, .. } if text != final_text => {}
                _ => return false,
            }
            if let ConversationItem::Message { text, .. } = &mut Arc::make_mut(items)[idx] {
                *text = final_text.to_owned();
            }
            true
        }
    }
}

pub(crate) fn append_reasoning(
    items: &mut Arc<Vec<ConversationItem>>,
    item_id: &str,
    field: ReasoningField,
    delta: &str,
) -> bool {
    if delta.is_empty() {
        return false;
    }
    match item_index(items, item_id) {
        None => {
            let (summary, content) = match field {
                ReasoningField::Summary => (delta.to_owned(), String::new()),
                ReasoningField::Content => (String::new(), delta.to_owned()),
            };
            push_item(
                items,
                ConversationItem::Reasoning {
                    id: item_id.to_owned(),
                    summary,
                    content,
                },
            );
            true
        }
        Some(idx) => {
            if !matches!(items[idx], ConversationItem::Reasoning { .. }) {
                return false;
            }
            if let ConversationItem::Reasoning {
                summary, content, ..
            } = &mut Arc::make_mut(items)[idx]
            {
                match field {
                    ReasoningField::Summary => summary.push_str(delta),
                    ReasoningField::Content => content.push_str(delta),
                }
            }
            true
        }
    }
}

pub(crate) fn append_tool_output(
    items: &mut Arc<Vec<ConversationItem>>,
    item_id: &str,
    delta: &str,
) -> bool {
    if delta.is_empty() {
        return false;
    }
    let Some(idx) = item_index(items, item_id) else {
        return false;
    };
    if !matches!(items[idx], ConversationItem::Tool { .. }) {
        return false;
    }
    if let ConversationItem::Tool { output, .. } = &mut Arc::make_mut(items)[idx] {
        output.push_str(delta);
    }
    true
}

fn supersedes_placeholder(incoming: &ConversationItem, existing: &ConversationItem) -> bool {
    let ConversationItem::Review {
        id: incoming_id,
        state: ReviewState::Started,
        origin: ItemOrigin::Remote {
            correlation_id: incoming_correlation,
        },
        ..
    } = incoming
    else {
        return false;
    };
    if existing.id() == incoming_id || !existing.is_pending_local_review_start() {
        return false;
    }
    let ConversationItem::Review { origin, .. } = existing else {
        return false;
    };
    match (incoming_correlation.as_deref(), origin.correlation_id()) {
        (Some(incoming), Some(local)) => incoming == local,
        _ => true,
    }
}

/// Inserts or replaces an item by id. A remote "review started" first drops the local
/// placeholders it confirms. An existing item never changes kind.
pub(crate) fn upsert_item(items: &mut Arc<Vec<ConversationItem>>, item: ConversationItem) -> bool {
    let existing = item_index(items, item.id());
    if let Some(idx) = existing {
        let current = &items[idx];
        if current.kind() != item.kind() || *current == item {
            return false;
        }
    }

    let superseded = items
        .iter()
        .any(|existing| supersedes_placeholder(&item, existing));
    if superseded {
        Arc::make_mut(items).retain(|existing| !supersedes_placeholder(&item, existing));
    }

    match item_index(items, item.id()) {
        Some(idx) => Arc::make_mut(items)[idx] = item,
        None => push_item(items, item),
    }
    true
}

/// Keeps the first occurrence of every id.
pub(crate) fn dedupe_items(items: Vec<ConversationItem>) -> Vec<ConversationItem> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.id().to_owned()))
        .collect()
}
