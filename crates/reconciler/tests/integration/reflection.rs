use pretty_assertions::assert_eq;
use weft_reconciler::{BoundaryState, Element, UnitTag};

use crate::common::{Harness, host, text};

fn tree(label: &str, with_paragraph: bool) -> Element {
	let boundary = Element::boundary([text("wait")], [host("span", [text("ready")])]).with_key("b");
	let paragraph = with_paragraph.then(|| host("p", [text(label)]).with_key("p"));
	host("div", paragraph.into_iter().chain([boundary]))
}

fn snapshot(h: &Harness, unit: weft_reconciler::UnitId) -> Option<String> {
	let node = h.root.find_current_host_node(unit)?;
	Some(h.root.with_host(|host| host.snapshot(node)).unwrap())
}

#[test]
fn test_queries_over_mounted_tree() {
	let h = Harness::new();
	h.root.render(tree("x", true)).unwrap();
	h.flush();

	let root = h.root.current().unwrap();
	assert_eq!(h.root.tag(root), Some(UnitTag::Root));
	let div = h.root.children(root)[0];
	let p = h.root.find_keyed("p").unwrap();
	let b = h.root.find_keyed("b").unwrap();

	assert_eq!(h.root.tag(p), Some(UnitTag::Host));
	assert_eq!(h.root.tag(b), Some(UnitTag::Boundary));
	assert_eq!(h.root.children(div), vec![p, b]);
	assert!(h.root.contains(div, p));
	assert!(h.root.contains(root, b));
	assert!(!h.root.contains(p, div));

	assert_eq!(snapshot(&h, p).as_deref(), Some("<p>x</p>"));
	assert_eq!(snapshot(&h, b).as_deref(), Some("<span>ready</span>"));
	assert_eq!(h.root.boundary_state(b), Some(BoundaryState::default()));
	assert_eq!(h.root.boundary_state(p), None);
	assert!(!h.root.is_boundary_showing_fallback(b));
}

#[test]
fn test_stale_buffer_handle_resolves_to_committed_unit() {
	let h = Harness::new();
	h.root.render(tree("x", true)).unwrap();
	h.flush();
	let before = h.root.find_keyed("p").unwrap();

	h.root.render(tree("y", true)).unwrap();
	h.flush();
	h.root.render(tree("z", true)).unwrap();
	h.flush();

	assert_eq!(h.root.nearest_mounted(before), h.root.find_keyed("p"));
	assert_eq!(snapshot(&h, before).as_deref(), Some("<p>z</p>"));
	assert_eq!(h.root.find_current_host_unit(before), h.root.find_keyed("p"));
}

#[test]
fn test_deleted_unit_is_no_longer_mounted() {
	let h = Harness::new();
	h.root.render(tree("x", true)).unwrap();
	h.flush();
	let p = h.root.find_keyed("p").unwrap();
	let b = h.root.find_keyed("b").unwrap();

	h.root.render(tree("x", false)).unwrap();
	h.flush();

	let root = h.root.current().unwrap();
	assert_eq!(h.html(), "<div><span>ready</span></div>");
	assert_eq!(h.root.find_keyed("p"), None);
	assert_eq!(h.root.nearest_mounted(p), None);
	assert_eq!(h.root.tag(p), None);
	assert!(!h.root.contains(root, p));
	assert_eq!(snapshot(&h, p), None);
	assert_eq!(h.root.nearest_mounted(b), h.root.find_keyed("b"));
}
