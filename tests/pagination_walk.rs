//! Cursor pagination walks over live data.

mod common;

use common::{TestManager, context, create, test_manager};
use organization_manager::{BasicOrganization, ListQuery, RequestContext, SortKey, SortOrder};
use std::collections::HashSet;

async fn walk_forward(
    manager: &TestManager,
    ctx: &RequestContext,
    query: &ListQuery,
    mut between_pages: impl AsyncFnMut(usize),
) -> Vec<BasicOrganization> {
    let mut items = Vec::new();
    let mut page = manager.get_organizations(ctx, query).await.unwrap();
    let mut page_number = 0;
    loop {
        items.extend(page.items.iter().cloned());
        let Some(cursor) = page.next_cursor.clone() else {
            break;
        };
        between_pages(page_number).await;
        page_number += 1;
        page = manager
            .get_organizations(ctx, &query.clone().with_after(cursor))
            .await
            .unwrap();
    }
    items
}

fn ids(items: &[BasicOrganization]) -> Vec<String> {
    items.iter().map(|o| o.id.clone()).collect()
}

#[tokio::test]
async fn test_pages_concatenate_to_the_full_listing() {
    let manager = test_manager();
    let ctx = context();
    for i in 0..23 {
        create(&manager, &format!("Org {:02}", i), None).await;
    }

    for (sort_by, sort_order) in [
        (SortKey::Created, SortOrder::Ascending),
        (SortKey::Created, SortOrder::Descending),
        (SortKey::Name, SortOrder::Ascending),
        (SortKey::Name, SortOrder::Descending),
    ] {
        let base = ListQuery::new()
            .with_sort_by(sort_by)
            .with_sort_order(sort_order);
        let full = manager
            .get_organizations(&ctx, &base.clone().with_limit(100))
            .await
            .unwrap();
        assert_eq!(full.len(), 23);
        assert!(full.next_cursor.is_none());

        let paged = base.clone().with_limit(4);
        let walked = walk_forward(&manager, &ctx, &paged, async |_| {}).await;
        assert_eq!(ids(&walked), ids(&full.items), "{:?} {:?}", sort_by, sort_order);
    }
}

#[tokio::test]
async fn test_walk_is_stable_under_unrelated_inserts() {
    let manager = test_manager();
    let listed_root = create(&manager, "Listed", None).await;
    let other_root = create(&manager, "Elsewhere", None).await;
    for i in 0..12 {
        create(&manager, &format!("Member {:02}", i), Some(&listed_root.id)).await;
    }

    let ctx = RequestContext::for_organization(&listed_root.id);
    let query = ListQuery::new()
        .with_sort_by(SortKey::Name)
        .with_sort_order(SortOrder::Ascending)
        .with_limit(5);
    let expected = manager
        .get_organizations(&ctx, &query.clone().with_limit(100))
        .await
        .unwrap();

    let walked = walk_forward(&manager, &ctx, &query, async |page| {
        create(&manager, &format!("Noise {}", page), Some(&other_root.id)).await;
        create(&manager, &format!("Root Noise {}", page), None).await;
    })
    .await;

    assert_eq!(ids(&walked), ids(&expected.items));
}

#[tokio::test]
async fn test_walk_has_no_duplicates_when_the_listing_itself_grows() {
    let manager = test_manager();
    let ctx = context();
    for i in 0..10 {
        create(&manager, &format!("B{:02}", i), None).await;
    }
    let before = manager
        .get_organizations(&ctx, &ListQuery::new().with_limit(100))
        .await
        .unwrap();

    let query = ListQuery::new()
        .with_sort_by(SortKey::Name)
        .with_sort_order(SortOrder::Ascending)
        .with_limit(3);
    // "A.." sorts before every cursor and is never reached; "C.." sorts
    // after every cursor and is picked up at the end.
    let walked = walk_forward(&manager, &ctx, &query, async |page| {
        create(&manager, &format!("A{:02}", page), None).await;
        create(&manager, &format!("C{:02}", page), None).await;
    })
    .await;

    let walked_ids = ids(&walked);
    let unique: HashSet<&String> = walked_ids.iter().collect();
    assert_eq!(unique.len(), walked_ids.len());
    for original in &before.items {
        assert!(walked_ids.contains(&original.id), "{} missing", original.name);
    }
    assert!(walked.iter().all(|o| !o.name.starts_with('A')));
    assert!(walked.iter().any(|o| o.name.starts_with('C')));
}

#[tokio::test]
async fn test_backward_walk_mirrors_forward_walk() {
    let manager = test_manager();
    let ctx = context();
    for i in 0..9 {
        create(&manager, &format!("Org {}", i), None).await;
    }
    let query = ListQuery::new()
        .with_sort_by(SortKey::Name)
        .with_sort_order(SortOrder::Descending)
        .with_limit(4);

    let forward = walk_forward(&manager, &ctx, &query, async |_| {}).await;

    // Walk back from the last page using previous cursors.
    let mut page = manager.get_organizations(&ctx, &query).await.unwrap();
    while let Some(cursor) = page.next_cursor.clone() {
        page = manager
            .get_organizations(&ctx, &query.clone().with_after(cursor))
            .await
            .unwrap();
    }
    let mut backward: Vec<BasicOrganization> = page.items.clone();
    while let Some(cursor) = page.previous_cursor.clone() {
        page = manager
            .get_organizations(&ctx, &query.clone().with_before(cursor))
            .await
            .unwrap();
        let mut earlier = page.items.clone();
        earlier.extend(backward);
        backward = earlier;
    }

    assert_eq!(ids(&backward), ids(&forward));
}
