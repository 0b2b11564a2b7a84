use std::future::Future;

use futures::stream::{self, Stream, StreamExt};

/// Runs `work` over `items` with at most `limit` futures outstanding.
///
/// Slots are refilled greedily: as soon as any unit resolves the next
/// unclaimed item starts, so one slow item never strands idle capacity.
/// Results are yielded in completion order, tagged with the item's index.
pub fn pooled<T, R, F, Fut>(
    items: Vec<T>,
    limit: usize,
    mut work: F,
) -> impl Stream<Item = (usize, R)>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = R>,
{
    stream::iter(items.into_iter().enumerate().map(move |(index, item)| {
        let unit = work(item);
        async move { (index, unit.await) }
    }))
    .buffer_unordered(limit.max(1))
}

/// Drives [`pooled`] to completion, firing `on_done` for every item the
/// moment it resolves. Returns the results in input order.
pub async fn run_pooled<T, R, F, Fut, C>(items: Vec<T>, limit: usize, work: F, mut on_done: C) -> Vec<R>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = R>,
    C: FnMut(usize, &R),
{
    let total = items.len();
    let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(total).collect();
    let results = pooled(items, limit, work);
    futures::pin_mut!(results);
    while let Some((index, result)) = results.next().await {
        on_done(index, &result);
        slots[index] = Some(result);
    }
    slots.into_iter().flatten().collect()
}
