//! Consistency verification: bidirectional diff, repair convergence and
//! the missing-preview flag

mod helpers;

use chrono::Duration;
use collection_index::{
	MaintenanceReport, PreviewAsset, RebuildMode, RebuildOptions, Scope, SortDirection, SortField,
};
use helpers::{base_time, collection, engine};
use pretty_assertions::assert_eq;
use uuid::Uuid;

#[tokio::test]
async fn dry_run_reports_the_diff_without_repairing() {
	let env = engine();
	let indexed = collection("indexed").build();
	env.primary.insert(indexed.clone()).await;
	env.index.writer().upsert(&indexed).await.unwrap();

	let unindexed = collection("unindexed").build();
	env.primary.insert(unindexed.clone()).await;

	let first = env.index.admin().verify_index(true).await.unwrap();
	assert!(!first.is_consistent);
	assert_eq!(first.to_add, 1);
	assert_eq!(first.missing_in_index, vec![unindexed.id]);
	assert_eq!(first.total_in_primary, 2);
	assert_eq!(first.total_in_index, 1);
	assert!(first.dry_run);

	// Nothing was repaired
	let second = env.index.admin().verify_index(true).await.unwrap();
	assert!(!second.is_consistent);
	assert_eq!(second.to_add, 1);
}

#[tokio::test]
async fn repair_converges_after_arbitrary_primary_mutations() {
	let env = engine();

	// Indexed baseline
	let mut baseline = Vec::new();
	for i in 0..4 {
		let c = collection(&format!("base-{i}")).build();
		env.primary.insert(c.clone()).await;
		env.index.writer().upsert(&c).await.unwrap();
		baseline.push(c);
	}

	// Mutations with no corresponding index calls: two adds, one update,
	// one hard delete, one soft delete
	let added_a = collection("added-a").build();
	let added_b = collection("added-b").build();
	env.primary.insert(added_a.clone()).await;
	env.primary.insert(added_b.clone()).await;
	env.primary
		.touch(baseline[0].id, base_time() + Duration::seconds(500))
		.await;
	env.primary.hard_delete(baseline[1].id).await;
	env.primary
		.soft_delete(baseline[2].id, base_time() + Duration::seconds(501))
		.await;

	let repair = env.index.admin().verify_index(false).await.unwrap();
	assert!(!repair.is_consistent);
	assert_eq!(repair.to_add, 2);
	assert_eq!(repair.to_update, 1);
	assert_eq!(repair.to_remove, 2);
	assert_eq!(repair.outdated_in_index, vec![baseline[0].id]);
	assert!(!repair.dry_run);

	let check = env.index.admin().verify_index(true).await.unwrap();
	assert!(check.is_consistent);
	assert_eq!(check.to_add, 0);
	assert_eq!(check.to_update, 0);
	assert_eq!(check.to_remove, 0);
	assert_eq!(check.total_in_primary, 4);
	assert_eq!(check.total_in_index, 4);

	// Removed collections no longer surface in listings
	let page = env
		.index
		.query()
		.page(Scope::Global, SortField::Name, SortDirection::Asc, 1, 10)
		.await
		.unwrap();
	assert_eq!(page.total, 4);
	assert!(!page.ids.contains(&baseline[1].id));
	assert!(!page.ids.contains(&baseline[2].id));
}

#[tokio::test]
async fn preview_gained_after_indexing_flags_an_update() {
	let env = engine();
	let c = collection("coverless").build();
	env.primary.insert(c.clone()).await;
	env.index.writer().upsert(&c).await.unwrap();

	// The collection gains a cover without its updated_at advancing
	env.primary
		.add_preview(
			c.id,
			PreviewAsset {
				id: Uuid::new_v4(),
				path: "previews/cover.webp".into(),
				size_bytes: 512,
			},
		)
		.await;

	let result = env.index.admin().verify_index(true).await.unwrap();
	assert_eq!(result.to_update, 1);
	assert_eq!(result.outdated_in_index, vec![c.id]);
}

#[tokio::test]
async fn orphan_removal_strips_every_trace() {
	let env = engine();
	let c = collection("doomed").build();
	env.primary.insert(c.clone()).await;
	env.index.writer().upsert(&c).await.unwrap();
	env.primary.hard_delete(c.id).await;

	let result = env.index.admin().verify_index(false).await.unwrap();
	assert_eq!(result.orphaned_in_index, vec![c.id]);
	assert!(env.store.snapshot().await.is_empty());
}

#[tokio::test]
async fn verify_mode_routes_through_the_rebuild_surface() {
	let env = engine();
	let c = collection("routed").build();
	env.primary.insert(c.clone()).await;

	let report = env
		.index
		.admin()
		.rebuild_index(
			RebuildMode::Verify,
			RebuildOptions {
				dry_run: true,
				..Default::default()
			},
		)
		.await
		.unwrap();
	match report {
		MaintenanceReport::Verify(result) => {
			assert!(result.dry_run);
			assert_eq!(result.to_add, 1);
		}
		MaintenanceReport::Rebuild(stats) => panic!("expected verify result, got {stats:?}"),
	}
}

#[tokio::test]
async fn index_state_reflects_the_last_write() {
	let env = engine();
	let c = collection("tracked")
		.updated_offset(42)
		.preview("previews/x.webp", 256)
		.build();
	env.primary.insert(c.clone()).await;
	env.index.writer().upsert(&c).await.unwrap();

	let state = env
		.index
		.admin()
		.entity_index_state(c.id)
		.await
		.unwrap()
		.unwrap();
	assert_eq!(state.collection_id, c.id);
	assert_eq!(state.source_updated_at, c.updated_at);
	assert!(state.has_first_preview);
	assert_eq!(state.first_preview_path.as_deref(), Some("previews/x.webp"));
}
