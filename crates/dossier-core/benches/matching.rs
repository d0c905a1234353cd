use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use dossier_core::kinds::FieldKind;
use dossier_core::matching::{MatchEngine, MatchQuery};
use dossier_core::repository::{MemoryRepository, Repository};
use dossier_core::types::{DataItem, Entity, OwnerRef};

fn seeded_repo(n: usize) -> Arc<MemoryRepository> {
    let repo = Arc::new(MemoryRepository::new());
    for i in 0..n {
        let entity = Entity::new(format!("Entity {i}"));
        repo.put_entity(&entity).unwrap();
        repo.put_data_item(&DataItem::new(
            FieldKind::Email,
            format!("user{i}@example.com"),
            Some(OwnerRef::Entity(entity.id)),
        ))
        .unwrap();
        repo.put_data_item(&DataItem::new(
            FieldKind::Name,
            format!("jordan example{i}"),
            Some(OwnerRef::Entity(entity.id)),
        ))
        .unwrap();
    }
    repo
}

fn bench_exact_match_1k(c: &mut Criterion) {
    let engine = MatchEngine::new(seeded_repo(1000));
    let query = MatchQuery::new().with_include_partial(false);

    c.bench_function("exact email match (1k items)", |b| {
        b.iter(|| {
            engine
                .find_matches("user500@example.com", FieldKind::Email, &query)
                .unwrap();
        });
    });
}

fn bench_fuzzy_name_scan_1k(c: &mut Criterion) {
    let engine = MatchEngine::new(seeded_repo(1000));
    let query = MatchQuery::new();

    c.bench_function("fuzzy name scan (1k items)", |b| {
        b.iter(|| {
            engine
                .find_matches("jordan exampel500", FieldKind::Name, &query)
                .unwrap();
        });
    });
}

criterion_group!(benches, bench_exact_match_1k, bench_fuzzy_name_scan_1k);
criterion_main!(benches);
