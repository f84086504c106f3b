//! `Waitlist` — the ordered set of inference items awaiting execution.

use tracing::debug;

use crate::inference::InferenceEntry;

/// One scheduled item on the waitlist, wrapping the inference it runs.
#[derive(Clone, Debug)]
pub struct WaitlistItem {
    pub inference: InferenceEntry,
}

impl WaitlistItem {
    pub fn new(inference: InferenceEntry) -> Self {
        Self { inference }
    }

    pub fn id(&self) -> &str {
        &self.inference.id
    }

    pub fn flow_index(&self) -> &str {
        &self.inference.flow_index
    }
}

impl PartialEq for WaitlistItem {
    fn eq(&self, other: &Self) -> bool {
        self.inference.id == other.inference.id
    }
}
impl Eq for WaitlistItem {}

/// Parse a dot-notation flow index like `"1.7.2"` into a sort key
/// `[1, 7, 2]`. Non-numeric segments sort after numeric ones at the same
/// position, so malformed indices don't panic.
fn flow_index_sort_key(flow_index: &str) -> Vec<i64> {
    flow_index
        .split('.')
        .map(|segment| segment.parse::<i64>().unwrap_or(i64::MAX))
        .collect()
}

/// The set of inference items still awaiting (or mid-) execution for a run.
#[derive(Debug, Default)]
pub struct Waitlist {
    items: Vec<WaitlistItem>,
}

impl Waitlist {
    pub fn new(items: Vec<WaitlistItem>) -> Self {
        let mut waitlist = Self { items };
        waitlist.sort_by_flow_index();
        waitlist
    }

    pub fn from_inferences(inferences: impl IntoIterator<Item = InferenceEntry>) -> Self {
        Self::new(inferences.into_iter().map(WaitlistItem::new).collect())
    }

    pub fn sort_by_flow_index(&mut self) {
        self.items
            .sort_by_key(|item| flow_index_sort_key(item.flow_index()));
    }

    pub fn items(&self) -> &[WaitlistItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn get(&self, id: &str) -> Option<&WaitlistItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn get_by_flow_index(&self, flow_index: &str) -> Option<&WaitlistItem> {
        self.items.iter().find(|item| item.flow_index() == flow_index)
    }

    pub fn remove(&mut self, id: &str) -> Option<WaitlistItem> {
        let pos = self.items.iter().position(|item| item.id() == id)?;
        debug!(id, "Waitlist::remove");
        Some(self.items.remove(pos))
    }

    /// Items whose flow index is a descendant of `target`'s — i.e. starts
    /// with `{target_flow_index}.`. A target's readiness depends on these
    /// completing first.
    pub fn get_supporting_items(&self, target: &WaitlistItem) -> Vec<&WaitlistItem> {
        let prefix = format!("{}.", target.flow_index());
        self.items
            .iter()
            .filter(|item| item.flow_index().starts_with(&prefix))
            .collect()
    }

    /// Items whose flow index is an ancestor prefix of `target`'s — i.e.
    /// `target`'s flow index starts with `{item_flow_index}.`. These are
    /// the items `target` supports; a timing gate's skip propagates up to
    /// these, not down.
    pub fn get_dependent_items(&self, target: &WaitlistItem) -> Vec<&WaitlistItem> {
        self.items
            .iter()
            .filter(|item| target.flow_index().starts_with(&format!("{}.", item.flow_index())))
            .collect()
    }
}
