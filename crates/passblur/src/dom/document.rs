//! Arena-backed document tree.

use super::mutation::{MutationKind, MutationRecord, ObserverOptions};
use super::node::{Element, Node, NodeData, NodeId, Rect};
use super::{DomError, Result};

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Debug)]
struct Observer {
    root: NodeId,
    options: ObserverOptions,
}

/// A page: a tree of elements and text rooted at `body`.
///
/// Structural changes and attribute writes are reported to the observer,
/// if one is attached. Writes to the live `value` property are not, which
/// is how script-driven autofill behaves.
#[derive(Debug)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    body: NodeId,
    observer: Option<Observer>,
    records: Vec<MutationRecord>,
    selection: Option<NodeId>,
}

impl Document {
    /// Create an empty document containing only `body`.
    #[must_use]
    pub fn new() -> Self {
        let mut doc = Self {
            slots: Vec::new(),
            free: Vec::new(),
            body: NodeId::new(0, 0),
            observer: None,
            records: Vec::new(),
            selection: None,
        };
        doc.body = doc.alloc(NodeData::Element(Element::new("body")));
        doc
    }

    /// The root `body` element.
    #[must_use]
    pub fn body(&self) -> NodeId {
        self.body
    }

    // === Allocation ===

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let node = Node::new(data);
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId::new(index, slot.generation)
        } else {
            let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId::new(index, 0)
        }
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_ref())
            .ok_or(DomError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_mut())
            .ok_or(DomError::NodeNotFound(id))
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut Element> {
        match &mut self.node_mut(id)?.data {
            NodeData::Element(el) => Ok(el),
            NodeData::Text(_) => Err(DomError::NotAnElement(id)),
        }
    }

    /// Check whether the id refers to a live node.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element(Element::new(tag)))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Text(text.to_string()))
    }

    /// Create an element with attributes and append it to `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if `parent` is not a live element.
    pub fn append_element(
        &mut self,
        parent: NodeId,
        tag: &str,
        attributes: &[(&str, &str)],
    ) -> Result<NodeId> {
        let id = self.create_element(tag);
        {
            let el = self.element_mut(id)?;
            for (name, value) in attributes {
                el.set_attribute(name, value);
            }
        }
        self.append_child(parent, id)?;
        Ok(id)
    }

    /// Create a text node and append it to `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if `parent` is not a live element.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> Result<NodeId> {
        let id = self.create_text(text);
        self.append_child(parent, id)?;
        Ok(id)
    }

    // === Inspection ===

    /// The element data of a node, if it is a live element.
    #[must_use]
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.node(id).ok()?.data {
            NodeData::Element(el) => Some(el),
            NodeData::Text(_) => None,
        }
    }

    /// Check whether the node is a live element.
    #[must_use]
    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    /// Check whether the node is a live text node.
    #[must_use]
    pub fn is_text(&self, id: NodeId) -> bool {
        self.text(id).is_some()
    }

    /// The lowercased tag of an element.
    #[must_use]
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(Element::tag)
    }

    /// The text of a text node.
    #[must_use]
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).ok()?.data {
            NodeData::Text(text) => Some(text),
            NodeData::Element(_) => None,
        }
    }

    /// Replace the text of a text node.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is missing or not a text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<()> {
        match &mut self.node_mut(id)?.data {
            NodeData::Text(existing) => {
                text.clone_into(existing);
                Ok(())
            }
            NodeData::Element(_) => Err(DomError::NotAText(id)),
        }
    }

    /// The parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).ok()?.parent
    }

    /// The children of a node. Empty for missing nodes.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.node(id) {
            Ok(node) => &node.children,
            Err(_) => &[],
        }
    }

    /// The sibling following a node.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = self.children(self.parent(id)?);
        let pos = siblings.iter().position(|c| *c == id)?;
        siblings.get(pos + 1).copied()
    }

    /// Ancestors of a node, nearest first.
    #[must_use]
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            out.push(node);
            current = self.parent(node);
        }
        out
    }

    /// The nearest inclusive ancestor accepted by the predicate.
    pub fn closest(&self, id: NodeId, mut predicate: impl FnMut(NodeId) -> bool) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if predicate(node) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    /// Descendants of a node in document order, excluding the node.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Check whether the node is attached to `body`.
    #[must_use]
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains(id) && self.closest(id, |n| n == self.body).is_some()
    }

    /// Check whether `node` is `ancestor` or one of its descendants.
    #[must_use]
    pub fn is_inclusive_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        self.closest(node, |n| n == ancestor).is_some()
    }

    /// Concatenated text of a node and its descendants.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    // === Attributes ===

    /// An attribute of an element.
    #[must_use]
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attribute(name)
    }

    /// Check for an attribute on an element.
    #[must_use]
    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.attribute(id, name).is_some()
    }

    /// Set an attribute.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is missing or not an element.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<()> {
        let old_value = self.element_mut(id)?.set_attribute(name, value);
        self.record_attribute(id, name, old_value);
        Ok(())
    }

    /// Remove an attribute, returning its previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is missing or not an element.
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<Option<String>> {
        let old_value = self.element_mut(id)?.remove_attribute(name);
        if old_value.is_some() {
            self.record_attribute(id, name, old_value.clone());
        }
        Ok(old_value)
    }

    /// Check for a class on an element.
    #[must_use]
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id).is_some_and(|el| el.has_class(class))
    }

    /// Add a class to an element.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is missing or not an element.
    pub fn add_class(&mut self, id: NodeId, class: &str) -> Result<()> {
        let old_value = self.attribute(id, "class").map(str::to_string);
        if self.element_mut(id)?.add_class(class) {
            self.record_attribute(id, "class", old_value);
        }
        Ok(())
    }

    /// Remove a class from an element.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is missing or not an element.
    pub fn remove_class(&mut self, id: NodeId, class: &str) -> Result<()> {
        let old_value = self.attribute(id, "class").map(str::to_string);
        if self.element_mut(id)?.remove_class(class) {
            self.record_attribute(id, "class", old_value);
        }
        Ok(())
    }

    /// The live `value` property of a form control.
    #[must_use]
    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.element(id)?.value()
    }

    /// Set the live `value` property. Observers are not notified.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is missing or not an element.
    pub fn set_value(&mut self, id: NodeId, value: &str) -> Result<()> {
        self.element_mut(id)?.set_value(Some(value.to_string()));
        Ok(())
    }

    /// The layout box of an element. Zero-sized for anything else.
    #[must_use]
    pub fn bounds(&self, id: NodeId) -> Rect {
        self.element(id).map(Element::bounds).unwrap_or_default()
    }

    /// Set the layout box of an element.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is missing or not an element.
    pub fn set_bounds(&mut self, id: NodeId, bounds: Rect) -> Result<()> {
        self.element_mut(id)?.set_bounds(bounds);
        Ok(())
    }

    // === Tree mutation ===

    /// Append a child to an element.
    ///
    /// # Errors
    ///
    /// Returns an error if either node is missing or the insertion would
    /// create a cycle.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert a child before `reference`, or at the end when `None`.
    ///
    /// A child that is attached elsewhere is moved.
    ///
    /// # Errors
    ///
    /// Returns an error if a node is missing, `parent` is not an element,
    /// `reference` is not a child of `parent`, or the insertion would create
    /// a cycle.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<()> {
        self.element_mut(parent)?;
        self.node(child)?;
        if self.is_inclusive_descendant(parent, child) {
            return Err(DomError::HierarchyRequest(format!(
                "cannot insert {child} into its own subtree"
            )));
        }
        if let Some(reference) = reference {
            if self.parent(reference) != Some(parent) {
                return Err(DomError::NotAChild { parent, child: reference });
            }
        }

        self.detach(child)?;

        let position = match reference {
            Some(reference) => self
                .children(parent)
                .iter()
                .position(|c| *c == reference)
                .ok_or(DomError::NotAChild { parent, child: reference })?,
            None => self.children(parent).len(),
        };
        self.node_mut(parent)?.children.insert(position, child);
        self.node_mut(child)?.parent = Some(parent);

        self.record_child_list(parent, vec![child], Vec::new());
        Ok(())
    }

    /// Replace a node with a sequence of detached nodes, then free it.
    ///
    /// Observers see a single record listing every inserted node.
    ///
    /// # Errors
    ///
    /// Returns an error if a node is missing, `old` has no parent, or a
    /// replacement is already attached.
    pub fn replace_with(&mut self, old: NodeId, replacements: &[NodeId]) -> Result<()> {
        let parent = self.parent(old).ok_or(DomError::Detached(old))?;
        for node in replacements {
            if self.node(*node)?.parent.is_some() {
                return Err(DomError::HierarchyRequest(format!(
                    "replacement {node} is already attached"
                )));
            }
        }

        let position = self
            .children(parent)
            .iter()
            .position(|c| *c == old)
            .ok_or(DomError::NotAChild { parent, child: old })?;
        self.node_mut(parent)?
            .children
            .splice(position..=position, replacements.iter().copied());
        for node in replacements {
            self.node_mut(*node)?.parent = Some(parent);
        }
        self.node_mut(old)?.parent = None;

        self.record_child_list(parent, replacements.to_vec(), vec![old]);
        self.free_subtree(old);
        Ok(())
    }

    /// Detach a node from its parent, keeping it alive.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is missing.
    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        let Some(parent) = self.node(id)?.parent else {
            return Ok(());
        };
        self.node_mut(parent)?.children.retain(|c| *c != id);
        self.node_mut(id)?.parent = None;
        self.record_child_list(parent, Vec::new(), vec![id]);
        Ok(())
    }

    /// Detach a node and free it along with its subtree.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is missing or is `body`.
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        if id == self.body {
            return Err(DomError::HierarchyRequest("cannot remove body".to_string()));
        }
        self.detach(id)?;
        self.free_subtree(id);
        Ok(())
    }

    fn free_subtree(&mut self, id: NodeId) {
        let mut doomed = self.descendants(id);
        doomed.push(id);
        for node in doomed {
            if self.selection == Some(node) {
                self.selection = None;
            }
            if let Some(slot) = self.slots.get_mut(node.index()) {
                if slot.generation == node.generation() && slot.node.take().is_some() {
                    slot.generation = slot.generation.wrapping_add(1);
                    if let Ok(index) = u32::try_from(node.index()) {
                        self.free.push(index);
                    }
                }
            }
        }
    }

    // === Observation ===

    /// Attach the observer to `root`, replacing any previous observation.
    pub fn observe(&mut self, root: NodeId, options: ObserverOptions) {
        self.observer = Some(Observer { root, options });
    }

    /// Detach the observer and drop undelivered records.
    pub fn disconnect(&mut self) {
        self.observer = None;
        self.records.clear();
    }

    /// Check whether an observer is attached.
    #[must_use]
    pub fn is_observing(&self) -> bool {
        self.observer.is_some()
    }

    /// Take the records queued since the last call.
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }

    /// Check whether records are waiting to be delivered.
    #[must_use]
    pub fn has_pending_records(&self) -> bool {
        !self.records.is_empty()
    }

    fn observes(&self, target: NodeId) -> Option<&ObserverOptions> {
        let observer = self.observer.as_ref()?;
        let in_scope = if observer.options.subtree {
            self.is_inclusive_descendant(target, observer.root)
        } else {
            target == observer.root
        };
        in_scope.then_some(&observer.options)
    }

    fn record_child_list(&mut self, target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) {
        if self.observes(target).is_some_and(|o| o.child_list) {
            self.records.push(MutationRecord {
                target,
                kind: MutationKind::ChildList { added, removed },
            });
        }
    }

    fn record_attribute(&mut self, target: NodeId, name: &str, old_value: Option<String>) {
        if self
            .observes(target)
            .is_some_and(|o| o.accepts_attribute(name))
        {
            self.records.push(MutationRecord {
                target,
                kind: MutationKind::Attributes {
                    name: name.to_string(),
                    old_value,
                },
            });
        }
    }

    // === Selection ===

    /// Select the full contents of a node and return the selected text.
    ///
    /// Form controls select their value; other nodes their text content.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is missing.
    pub fn select_contents(&mut self, id: NodeId) -> Result<String> {
        self.node(id)?;
        self.selection = Some(id);
        Ok(self.selected_text().unwrap_or_default())
    }

    /// The currently selected text.
    #[must_use]
    pub fn selected_text(&self) -> Option<String> {
        let id = self.selection?;
        Some(
            self.value(id)
                .map_or_else(|| self.text_content(id), str::to_string),
        )
    }

    /// Clear the selection.
    pub fn clear_selection(&mut self) {
        self.selection = None;
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
