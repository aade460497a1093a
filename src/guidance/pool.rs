//! Bounded worker pool for candidate evaluation.
//!
//! Ranking is read-only and independent per candidate, so wide decision
//! contexts fan out across a small pool of named threads instead of one
//! sequential loop. Results are reassembled by index, so parallelism never
//! perturbs ranking determinism.

use crossbeam_channel::bounded;

/// Applies `f` to every item on up to `workers` threads, preserving order.
///
/// Falls back to the calling thread for a single worker or a single item.
pub(crate) fn parallel_map<T, R, F>(items: Vec<T>, workers: usize, f: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    let workers = workers.max(1).min(items.len().max(1));
    if workers == 1 {
        return items.into_iter().map(f).collect();
    }

    let count = items.len();
    let (job_tx, job_rx) = bounded::<(usize, T)>(count);
    let (result_tx, result_rx) = bounded::<(usize, R)>(count);

    for pair in items.into_iter().enumerate() {
        job_tx.send(pair).expect("job channel has capacity");
    }
    drop(job_tx);

    let mut out: Vec<Option<R>> = std::iter::repeat_with(|| None).take(count).collect();
    std::thread::scope(|scope| {
        for idx in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let f = &f;
            std::thread::Builder::new()
                .name(format!("twingraph-guidance-{idx}"))
                .spawn_scoped(scope, move || {
                    while let Ok((index, item)) = job_rx.recv() {
                        let _ = result_tx.send((index, f(item)));
                    }
                })
                .expect("failed to spawn guidance worker");
        }
        drop(result_tx);

        while let Ok((index, result)) = result_rx.recv() {
            out[index] = Some(result);
        }
    });

    out.into_iter()
        .map(|slot| slot.expect("every job completes"))
        .collect()
}
