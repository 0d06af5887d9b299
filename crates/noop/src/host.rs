use std::fmt;

use weft_reconciler::{Host, Props};

use crate::error::NoopError;

/// Handle to a node owned by a [`NoopHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "node#{}", self.0)
	}
}

/// One call the reconciler made into the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
	CreateNode { node: NodeId, tag: String },
	CreateText { node: NodeId, text: String },
	UpdateNode { node: NodeId, props: Props },
	UpdateText { node: NodeId, text: String },
	Append { parent: NodeId, child: NodeId },
	InsertBefore { parent: NodeId, child: NodeId, before: NodeId },
	Remove { parent: NodeId, child: NodeId },
	Prepare,
	Reset,
}

enum NodeKind {
	Container,
	Element { tag: String, props: Props },
	Text(String),
}

struct Node {
	kind: NodeKind,
	parent: Option<NodeId>,
	children: Vec<NodeId>,
}

/// In-memory host tree.
pub struct NoopHost {
	nodes: Vec<Node>,
	container: NodeId,
	log: Vec<Mutation>,
	/// Mutations left before the next injected failure.
	fail_after: Option<usize>,
}

impl Default for NoopHost {
	fn default() -> Self {
		Self::new()
	}
}

impl NoopHost {
	/// Creates a host holding an empty container node.
	pub fn new() -> Self {
		Self {
			nodes: vec![Node {
				kind: NodeKind::Container,
				parent: None,
				children: Vec::new(),
			}],
			container: NodeId(0),
			log: Vec::new(),
			fail_after: None,
		}
	}

	/// Node the root renders into.
	pub fn container(&self) -> NodeId {
		self.container
	}

	/// Makes the mutation after the next `count` successful ones fail.
	pub fn fail_after(&mut self, count: usize) {
		self.fail_after = Some(count);
	}

	/// Makes the next mutation fail.
	pub fn fail_next(&mut self) {
		self.fail_after(0);
	}

	/// Mutations received since the last [`NoopHost::take_log`].
	pub fn log(&self) -> &[Mutation] {
		&self.log
	}

	pub fn take_log(&mut self) -> Vec<Mutation> {
		std::mem::take(&mut self.log)
	}

	/// Markup of everything inside the container.
	pub fn render(&self) -> String {
		self.snapshot(self.container)
	}

	/// Markup of `node`: `<tag a="1">children</tag>` for elements, raw text
	/// for text nodes, and the concatenated children for the container.
	pub fn snapshot(&self, node: NodeId) -> String {
		let mut out = String::new();
		self.write_node(node, &mut out);
		out
	}

	/// Attached children of `node`.
	pub fn children(&self, node: NodeId) -> &[NodeId] {
		self.nodes.get(node.0).map_or(&[], |node| node.children.as_slice())
	}

	pub fn parent(&self, node: NodeId) -> Option<NodeId> {
		self.nodes.get(node.0).and_then(|node| node.parent)
	}

	/// Number of nodes ever created, the container included.
	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	fn write_node(&self, id: NodeId, out: &mut String) {
		let Some(node) = self.nodes.get(id.0) else {
			return;
		};
		match &node.kind {
			NodeKind::Container => {
				for &child in &node.children {
					self.write_node(child, out);
				}
			}
			NodeKind::Text(text) => out.push_str(text),
			NodeKind::Element { tag, props } => {
				out.push('<');
				out.push_str(tag);
				for (name, value) in props.iter() {
					out.push_str(&format!(" {name}=\"{value}\""));
				}
				out.push('>');
				for &child in &node.children {
					self.write_node(child, out);
				}
				out.push_str(&format!("</{tag}>"));
			}
		}
	}

	fn check(&mut self, operation: &'static str) -> Result<(), NoopError> {
		match self.fail_after {
			Some(0) => {
				self.fail_after = None;
				tracing::debug!(operation, "noop.injected_failure");
				Err(NoopError::Injected { operation })
			}
			Some(left) => {
				self.fail_after = Some(left - 1);
				Ok(())
			}
			None => Ok(()),
		}
	}

	fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, NoopError> {
		self.nodes.get_mut(id.0).ok_or(NoopError::UnknownNode(id))
	}

	fn insert(&mut self, kind: NodeKind) -> NodeId {
		let id = NodeId(self.nodes.len());
		self.nodes.push(Node {
			kind,
			parent: None,
			children: Vec::new(),
		});
		id
	}

	/// Unlinks `child` from wherever it is attached.
	fn detach(&mut self, child: NodeId) -> Result<(), NoopError> {
		if let Some(parent) = self.node_mut(child)?.parent.take() {
			self.node_mut(parent)?.children.retain(|&id| id != child);
		}
		Ok(())
	}

	fn record(&mut self, mutation: Mutation) {
		tracing::trace!(?mutation, "noop.mutation");
		self.log.push(mutation);
	}
}

impl Host for NoopHost {
	type Node = NodeId;
	type Error = NoopError;

	fn create_node(&mut self, tag: &str, props: &Props) -> Result<NodeId, NoopError> {
		self.check("create_node")?;
		let node = self.insert(NodeKind::Element {
			tag: tag.to_owned(),
			props: props.clone(),
		});
		self.record(Mutation::CreateNode { node, tag: tag.to_owned() });
		Ok(node)
	}

	fn create_text(&mut self, text: &str) -> Result<NodeId, NoopError> {
		self.check("create_text")?;
		let node = self.insert(NodeKind::Text(text.to_owned()));
		self.record(Mutation::CreateText { node, text: text.to_owned() });
		Ok(node)
	}

	fn update_node(&mut self, node: &NodeId, _old: &Props, new: &Props) -> Result<(), NoopError> {
		self.check("update_node")?;
		let id = *node;
		match &mut self.node_mut(id)?.kind {
			NodeKind::Element { props, .. } => *props = new.clone(),
			_ => return Err(NoopError::WrongKind { node: id, expected: "element" }),
		}
		self.record(Mutation::UpdateNode { node: id, props: new.clone() });
		Ok(())
	}

	fn update_text(&mut self, node: &NodeId, _old: &str, new: &str) -> Result<(), NoopError> {
		self.check("update_text")?;
		let id = *node;
		match &mut self.node_mut(id)?.kind {
			NodeKind::Text(text) => new.clone_into(text),
			_ => return Err(NoopError::WrongKind { node: id, expected: "text" }),
		}
		self.record(Mutation::UpdateText {
			node: id,
			text: new.to_owned(),
		});
		Ok(())
	}

	fn append_child(&mut self, parent: &NodeId, child: &NodeId) -> Result<(), NoopError> {
		self.check("append_child")?;
		let (parent, child) = (*parent, *child);
		self.node_mut(parent)?;
		self.detach(child)?;
		self.node_mut(parent)?.children.push(child);
		self.node_mut(child)?.parent = Some(parent);
		self.record(Mutation::Append { parent, child });
		Ok(())
	}

	fn insert_before(&mut self, parent: &NodeId, child: &NodeId, before: &NodeId) -> Result<(), NoopError> {
		self.check("insert_before")?;
		let (parent, child, before) = (*parent, *child, *before);
		if !self.node_mut(parent)?.children.contains(&before) {
			return Err(NoopError::NotAChild { parent, child: before });
		}
		self.detach(child)?;
		let siblings = &mut self.node_mut(parent)?.children;
		let index = siblings.iter().position(|&id| id == before).unwrap_or(siblings.len());
		siblings.insert(index, child);
		self.node_mut(child)?.parent = Some(parent);
		self.record(Mutation::InsertBefore { parent, child, before });
		Ok(())
	}

	fn remove_node(&mut self, parent: &NodeId, child: &NodeId) -> Result<(), NoopError> {
		self.check("remove_node")?;
		let (parent, child) = (*parent, *child);
		if self.node_mut(child)?.parent != Some(parent) {
			return Err(NoopError::NotAChild { parent, child });
		}
		self.detach(child)?;
		self.record(Mutation::Remove { parent, child });
		Ok(())
	}

	fn prepare_for_commit(&mut self) -> Result<(), NoopError> {
		self.record(Mutation::Prepare);
		Ok(())
	}

	fn reset_after_commit(&mut self) -> Result<(), NoopError> {
		self.record(Mutation::Reset);
		Ok(())
	}
}
