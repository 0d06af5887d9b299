use pretty_assertions::assert_eq;
use proptest::prelude::*;
use weft_reconciler::{Element, Lane, Lanes, Payload, RootPhase};
use weft_scheduler::Priority;

use crate::common::{Harness, Slow, host, list, text};

fn append(label: String) -> Payload {
	Payload::reduce(move |previous| {
		let previous = previous.and_then(Element::as_text).unwrap_or_default();
		text(&format!("{previous}{label}"))
	})
}

fn lane_for(h: &Harness, choice: usize) -> Lane {
	match choice {
		0 => Lanes::SYNC,
		1 => Lanes::INPUT_CONTINUOUS,
		2 => Lanes::DEFAULT,
		3 => Lanes::IDLE,
		_ => h.root.request_lane(Priority::Low).unwrap(),
	}
}

proptest! {
	/// Must apply every update in arrival order once all lanes are flushed.
	///
	/// - Enforced in: `UpdateQueue::process`
	/// - Failure symptom: Final state depends on which lanes rendered first.
	#[test]
	fn updates_apply_in_arrival_order(ops in prop::collection::vec((0usize..5, any::<bool>()), 1..12)) {
		let h = Harness::new();
		let mut expected = String::new();

		for (i, (choice, flush)) in ops.into_iter().enumerate() {
			let label = format!("{i};");
			expected.push_str(&label);
			let lane = lane_for(&h, choice);
			h.root.request_update(lane, append(label)).unwrap();
			if flush {
				h.flush();
			}
		}
		h.flush();

		prop_assert_eq!(h.html(), expected);
		prop_assert!(!h.root.has_pending_work());
	}
}

/// Must not expose a partially rendered tree.
///
/// - Enforced in: `Root::commit`, `RootState::current_of`
/// - Failure symptom: Host or reflection shows half of an interrupted render.
#[test]
fn test_yielded_render_is_invisible() {
	let h = Harness::new();
	h.root.render(host("div", [text("old")])).unwrap();
	h.flush();
	let root = h.root.current().unwrap();
	let div = h.root.children(root)[0];

	h.root
		.render(host("div", [Element::component(Slow { clock: h.clock.clone() }), text("new")]))
		.unwrap();
	h.scheduler.flush().unwrap();
	assert_eq!(h.root.phase().unwrap(), RootPhase::Rendering(Lanes::DEFAULT));

	assert_eq!(h.html(), "<div>old</div>");
	assert_eq!(h.root.current(), Some(root));
	assert_eq!(h.root.children(div).len(), 1);

	h.flush();
	assert_eq!(h.html(), "<div>new</div>");
	assert_eq!(h.root.children(div).len(), 2);
}

/// Must reuse alternates instead of allocating a fresh tree per render.
///
/// - Enforced in: `RootState::create_work_in_progress`
/// - Failure symptom: Unit arena grows with every update.
#[test]
fn test_repeated_renders_keep_arena_bounded() {
	let h = Harness::new();
	h.root.render(list(&["a", "b", "c"])).unwrap();
	h.flush();
	h.root.render(list(&["a", "b", "c"])).unwrap();
	h.flush();
	let allocated = h.root.allocated_units();

	for _ in 0..5 {
		h.root.render(list(&["a", "b", "c"])).unwrap();
		h.flush();
	}
	assert_eq!(h.root.allocated_units(), allocated);
}

/// Must keep at most one scheduler task per root.
///
/// - Enforced in: `RootInner::ensure_root_is_scheduled`
/// - Failure symptom: Duplicate render passes for the same lanes.
#[test]
fn test_one_task_per_root() {
	let h = Harness::new();
	h.root.render(text("a")).unwrap();
	h.root.request_update(Lanes::IDLE, Payload::Replace(text("b"))).unwrap();
	assert_eq!(h.scheduler.pending_count(), 1);

	h.root.request_update(Lanes::INPUT_CONTINUOUS, Payload::Replace(text("c"))).unwrap();
	assert_eq!(h.scheduler.pending_count(), 1);

	h.flush();
	assert_eq!(h.html(), "c");
}
