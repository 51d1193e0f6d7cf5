//! Gather-all-settled combinator

use std::future::Future;

use futures::future::join_all;

/// Run `f` over every item concurrently and wait for all of them.
///
/// Each result is paired with the item that produced it; one failure never
/// short-circuits the others.
pub async fn gather_settled<K, F, Fut, T, E>(
    items: impl IntoIterator<Item = K>,
    f: F,
) -> Vec<(K, Result<T, E>)>
where
    F: Fn(&K) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    join_all(items.into_iter().map(|item| {
        let fut = f(&item);
        async move { (item, fut.await) }
    }))
    .await
}
