use super::*;
use std::collections::BTreeMap;

fn brute_force(agents: &BTreeMap<AgentId, Vec2>, center: Vec2, radius: f32) -> Vec<AgentId> {
    agents
        .iter()
        .filter(|(_, pos)| pos.distance_squared(center) <= radius * radius)
        .map(|(id, _)| *id)
        .collect()
}

#[test]
fn test_query_radius_filters_by_exact_distance() {
    let mut index = SpatialIndex::new(10.0);
    index.insert(AgentId(1), Vec2::new(0.0, 0.0));
    index.insert(AgentId(2), Vec2::new(5.0, 0.0));
    index.insert(AgentId(3), Vec2::new(9.0, 9.0));

    // Agent 3 shares a cell with agent 1 but lies outside the circle.
    let results = index.query_radius(Vec2::ZERO, 6.0);
    assert_eq!(results, vec![AgentId(1), AgentId(2)]);
}

#[test]
fn test_results_are_sorted_by_id() {
    let mut index = SpatialIndex::new(10.0);
    index.insert(AgentId(9), Vec2::new(1.0, 1.0));
    index.insert(AgentId(4), Vec2::new(25.0, 1.0));
    index.insert(AgentId(6), Vec2::new(-15.0, 1.0));

    let results = index.query_radius(Vec2::ZERO, 30.0);
    assert_eq!(results, vec![AgentId(4), AgentId(6), AgentId(9)]);
}

#[test]
fn test_update_same_cell_is_idempotent() {
    let mut index = SpatialIndex::new(32.0);
    index.insert(AgentId(1), Vec2::new(4.0, 4.0));

    assert!(!index.update(AgentId(1), Vec2::new(8.0, 4.0)));
    assert!(!index.update(AgentId(1), Vec2::new(8.0, 4.0)));
    assert_eq!(index.total_entries(), 1);
    assert_eq!(index.non_empty_cells(), 1);
    assert_eq!(index.position(AgentId(1)), Some(Vec2::new(8.0, 4.0)));
}

#[test]
fn test_update_moves_between_cells() {
    let mut index = SpatialIndex::new(32.0);
    index.insert(AgentId(1), Vec2::new(4.0, 4.0));

    assert!(index.update(AgentId(1), Vec2::new(40.0, 4.0)));
    assert_eq!(index.cell_count(IVec2::new(0, 0)), 0);
    assert_eq!(index.cell_count(IVec2::new(1, 0)), 1);
    assert_eq!(index.non_empty_cells(), 1);
}

#[test]
fn test_remove_leaves_no_reference() {
    let mut index = SpatialIndex::new(32.0);
    index.insert(AgentId(1), Vec2::new(4.0, 4.0));
    index.insert(AgentId(2), Vec2::new(6.0, 4.0));

    assert!(index.remove(AgentId(1)));
    assert!(!index.remove(AgentId(1)));
    assert!(!index.contains(AgentId(1)));
    assert_eq!(index.query_radius(Vec2::new(4.0, 4.0), 100.0), vec![AgentId(2)]);
    assert_eq!(index.query_cells(CellRect::around(IVec2::ZERO, 3)), vec![AgentId(2)]);
}

#[test]
fn test_empty_and_out_of_range_queries_return_nothing() {
    let mut index = SpatialIndex::new(32.0);
    assert!(index.query_radius(Vec2::new(1.0e6, -1.0e6), 50.0).is_empty());

    index.insert(AgentId(1), Vec2::new(4.0, 4.0));
    assert!(index.query_cells(CellRect::new(IVec2::new(100, 100), IVec2::new(120, 120))).is_empty());
    assert!(index.query_cells(CellRect::new(IVec2::new(2, 2), IVec2::new(1, 1))).is_empty());
    assert!(index.query_radius(Vec2::new(4.0, 4.0), -1.0).is_empty());
    assert!(index.query_radius(Vec2::new(f32::NAN, 0.0), 10.0).is_empty());
}

#[test]
fn test_query_cells_uses_cell_membership() {
    let mut index = SpatialIndex::new(10.0);
    index.insert(AgentId(1), Vec2::new(5.0, 5.0));
    index.insert(AgentId(2), Vec2::new(15.0, 5.0));
    index.insert(AgentId(3), Vec2::new(35.0, 5.0));

    let rect = CellRect::new(IVec2::new(0, 0), IVec2::new(1, 0));
    assert_eq!(index.query_cells(rect), vec![AgentId(1), AgentId(2)]);
}

#[test]
fn test_huge_rect_falls_back_to_sparse_scan() {
    let mut index = SpatialIndex::new(10.0);
    index.insert(AgentId(1), Vec2::new(5.0, 5.0));
    index.insert(AgentId(2), Vec2::new(-9_995.0, 9_995.0));

    let rect = CellRect::new(IVec2::splat(-100_000), IVec2::splat(100_000));
    assert_eq!(index.query_cells(rect), vec![AgentId(1), AgentId(2)]);
}

#[test]
fn test_unbounded_extents_answer_without_overflow() {
    let mut index = SpatialIndex::new(10.0);
    index.insert(AgentId(1), Vec2::new(5.0, 5.0));
    index.insert(AgentId(2), Vec2::new(-9_995.0, 9_995.0));

    assert_eq!(index.query_radius(Vec2::ZERO, 1.0e12), vec![AgentId(1), AgentId(2)]);
    assert_eq!(index.query_radius(Vec2::ZERO, f32::INFINITY).len(), 2);
    assert_eq!(index.query_cells(CellRect::new(IVec2::MIN, IVec2::MAX)), vec![AgentId(1), AgentId(2)]);
    assert_eq!(index.query_cells(CellRect::around(IVec2::ZERO, i32::MAX)).len(), 2);
    assert!(index.query_radius(Vec2::new(1.0e30, -1.0e30), 5.0).is_empty());
}

#[test]
fn test_random_operations_match_brute_force() {
    let mut rng = fastrand::Rng::with_seed(0x5EED);
    let mut index = SpatialIndex::new(32.0);
    let mut truth: BTreeMap<AgentId, Vec2> = BTreeMap::new();

    for step in 0..4_000 {
        let id = AgentId(rng.u32(0..200));
        let pos = Vec2::new(rng.f32() * 800.0 - 100.0, rng.f32() * 600.0 - 100.0);
        match rng.u8(0..3) {
            0 => {
                index.insert(id, pos);
                truth.insert(id, pos);
            }
            1 => {
                index.update(id, pos);
                truth.insert(id, pos);
            }
            _ => {
                let removed = index.remove(id);
                assert_eq!(removed, truth.remove(&id).is_some());
            }
        }

        if step % 50 == 0 {
            let center = Vec2::new(rng.f32() * 700.0 - 50.0, rng.f32() * 500.0 - 50.0);
            let radius = rng.f32() * 150.0;
            assert_eq!(
                index.query_radius(center, radius),
                brute_force(&truth, center, radius),
                "mismatch at step {}",
                step
            );
        }
    }

    assert_eq!(index.len(), truth.len());
    assert_eq!(index.total_entries(), truth.len());
}
