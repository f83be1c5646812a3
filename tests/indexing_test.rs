//! Writer-level behavior: scope entries, idempotence, scope moves, removal

mod helpers;

use collection_index::{CollectionKind, Scope, SortDirection, SortField, SortedSetStore};
use helpers::{base_time, collection, engine};
use pretty_assertions::assert_eq;
use strum::IntoEnumIterator;
use uuid::Uuid;

fn sorted_key(scope: &Scope, field: SortField, direction: SortDirection) -> String {
	match scope {
		Scope::Global => format!("cidx:sort:all:{field}:{direction}"),
		Scope::Library(id) => format!("cidx:sort:lib:{id}:{field}:{direction}"),
		Scope::Kind(kind) => format!("cidx:sort:kind:{kind}:{field}:{direction}"),
	}
}

#[tokio::test]
async fn upsert_populates_every_scope_field_direction_combination() {
	let env = engine();
	let library = Uuid::new_v4();
	let c = collection("summer").library(library).build();
	env.primary.insert(c.clone()).await;
	env.index.writer().upsert(&c).await.unwrap();

	let scopes = [
		Scope::Global,
		Scope::Library(library),
		Scope::Kind(CollectionKind::Album),
	];
	for scope in &scopes {
		for field in SortField::iter() {
			for direction in SortDirection::iter() {
				let key = sorted_key(scope, field, direction);
				assert_eq!(
					env.store.zcard(&key).await.unwrap(),
					1,
					"missing entry in {key}"
				);
				assert_eq!(
					env.store.zrank(&key, &c.id.to_string()).await.unwrap(),
					Some(0)
				);
			}
		}
	}

	// Summary and state written alongside the entries
	let summaries = env.index.query().summaries(&[c.id]).await.unwrap();
	assert_eq!(summaries[0].as_ref().unwrap().name, "summer");
	assert!(env
		.index
		.admin()
		.entity_index_state(c.id)
		.await
		.unwrap()
		.is_some());
}

#[tokio::test]
async fn repeated_upsert_is_byte_stable() {
	let env = engine();
	let c = collection("stable").items(4).size(2048).build();
	env.primary.insert(c.clone()).await;

	env.index.writer().upsert(&c).await.unwrap();
	let before: Vec<_> = env
		.store
		.snapshot()
		.await
		.into_iter()
		.filter(|(key, _)| !key.starts_with("cidx:state:"))
		.collect();

	env.index.writer().upsert(&c).await.unwrap();
	let after: Vec<_> = env
		.store
		.snapshot()
		.await
		.into_iter()
		.filter(|(key, _)| !key.starts_with("cidx:state:"))
		.collect();

	// Sorted entries and summary identical; only the state record's
	// indexed_at moves
	assert_eq!(before, after);
}

#[tokio::test]
async fn library_move_leaves_no_trace_in_the_old_scope() {
	let env = engine();
	let lib_a = Uuid::new_v4();
	let lib_b = Uuid::new_v4();
	let mut c = collection("moving").library(lib_a).build();
	env.primary.insert(c.clone()).await;
	env.index.writer().upsert(&c).await.unwrap();

	c.library_id = lib_b;
	env.index.writer().upsert(&c).await.unwrap();

	for field in SortField::iter() {
		for direction in SortDirection::iter() {
			let old = sorted_key(&Scope::Library(lib_a), field, direction);
			let new = sorted_key(&Scope::Library(lib_b), field, direction);
			assert_eq!(env.store.zcard(&old).await.unwrap(), 0, "stale entry in {old}");
			assert_eq!(env.store.zcard(&new).await.unwrap(), 1, "missing entry in {new}");
		}
	}
	// Global scope unaffected
	let global = sorted_key(&Scope::Global, SortField::Name, SortDirection::Asc);
	assert_eq!(env.store.zcard(&global).await.unwrap(), 1);
}

#[tokio::test]
async fn kind_change_moves_the_kind_scope() {
	let env = engine();
	let mut c = collection("reshaped").kind(CollectionKind::Album).build();
	env.primary.insert(c.clone()).await;
	env.index.writer().upsert(&c).await.unwrap();

	c.kind = CollectionKind::Smart;
	env.index.writer().upsert(&c).await.unwrap();

	let old = sorted_key(
		&Scope::Kind(CollectionKind::Album),
		SortField::Name,
		SortDirection::Asc,
	);
	let new = sorted_key(
		&Scope::Kind(CollectionKind::Smart),
		SortField::Name,
		SortDirection::Asc,
	);
	assert_eq!(env.store.zcard(&old).await.unwrap(), 0);
	assert_eq!(env.store.zcard(&new).await.unwrap(), 1);
}

#[tokio::test]
async fn upsert_of_a_soft_deleted_collection_removes_it() {
	let env = engine();
	let mut c = collection("departed").build();
	env.primary.insert(c.clone()).await;
	env.index.writer().upsert(&c).await.unwrap();
	assert!(!env.store.snapshot().await.is_empty());

	c.deleted_at = Some(base_time());
	env.primary.soft_delete(c.id, base_time()).await;
	env.index.writer().upsert(&c).await.unwrap();
	assert!(env.store.snapshot().await.is_empty());

	// And a deleted collection never gets indexed in the first place
	env.index.writer().upsert(&c).await.unwrap();
	assert!(env.store.snapshot().await.is_empty());
}

#[tokio::test]
async fn remove_strips_entries_summary_and_state() {
	let env = engine();
	let c = collection("ephemeral").build();
	env.primary.insert(c.clone()).await;
	env.index.writer().upsert(&c).await.unwrap();
	assert!(!env.store.snapshot().await.is_empty());

	env.index.writer().remove(c.id).await.unwrap();
	assert_eq!(env.store.snapshot().await.len(), 0);

	let summaries = env.index.query().summaries(&[c.id]).await.unwrap();
	assert!(summaries[0].is_none());
	assert!(env
		.index
		.admin()
		.entity_index_state(c.id)
		.await
		.unwrap()
		.is_none());
}
