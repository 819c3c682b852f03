use std::future::Future;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tracing::debug;

use super::controller::{Applied, ViewController, fetch_rows};
use crate::store::RowStore;

/// Runs a mounted view until `shutdown` resolves.
///
/// Issues the initial load, then one full refetch per change notification.
/// Fetches run concurrently on this task and may overlap; the controller
/// decides which result is applied. `on_update` is called after every applied
/// result, successful or not. On shutdown the view is unmounted and any fetch
/// still in flight is dropped.
pub async fn drive<S, F, U>(
    store: &S,
    controller: &mut ViewController,
    shutdown: F,
    mut on_update: U,
)
where
    S: RowStore + ?Sized,
    F: Future<Output = ()>,
    U: FnMut(&ViewController),
{
    tokio::pin!(shutdown);
    let mut in_flight = FuturesUnordered::new();

    if let Some(ticket) = controller.issue_fetch() {
        in_flight.push(fetch_rows(store, ticket));
    }

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                debug!(pending = in_flight.len(), "shutdown requested");
                break;
            }
            Some((ticket, result)) = in_flight.next(), if !in_flight.is_empty() => {
                match controller.apply(ticket, result) {
                    Applied::Rendered | Applied::Failed => on_update(controller),
                    Applied::Superseded => {}
                    Applied::Discarded => break,
                }
            }
            change = controller.next_change() => {
                if let Some(event) = change {
                    debug!(table = %event.table, kind = ?event.kind, "change received");
                    if let Some(ticket) = controller.issue_fetch() {
                        in_flight.push(fetch_rows(store, ticket));
                    }
                }
            }
        }
    }

    controller.unmount();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::TimerActions;
    use crate::feed::LocalFeed;
    use crate::store::MemoryStore;
    use crate::view::ViewState;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn change_triggers_refetch_and_rebuild() {
        let feed = LocalFeed::new();
        let store = MemoryStore::with_feed(feed.clone());
        let ws = store.add_workstation("Telar 1", Some("Tejido"));
        let order = store.add_order("OP-1", 100, "Jersey");
        let ana = store.add_employee("Ana");
        let timer = store.start_timer_row(ws.id, order.id);
        store.add_team_member(timer, ana).await.unwrap();

        let mut controller = ViewController::mount(&feed).unwrap();
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let mut done_tx = Some(done_tx);
        let mut renders = 0;

        let writer = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            TimerActions::new(&store).log_progress(timer, 40).await.unwrap();
        };
        let view = drive(
            &store,
            &mut controller,
            async {
                let _ = done_rx.await;
            },
            |c| {
                renders += 1;
                let produced = c.snapshots()[0].produced_total;
                if produced == 40
                    && let Some(tx) = done_tx.take()
                {
                    let _ = tx.send(());
                }
            },
        );

        tokio::time::timeout(Duration::from_secs(5), async { tokio::join!(view, writer) })
            .await
            .expect("view never saw the logged production");

        assert!(renders >= 2);
        assert_eq!(controller.state(), ViewState::Unmounted);
        assert_eq!(controller.snapshots()[0].produced_total, 40);
        assert_eq!(controller.snapshots()[0].progress_ratio, 0.4);
        assert_eq!(feed.subscriber_count(), 0);
        assert_eq!(feed.released_count(), 1);
    }

    #[tokio::test]
    async fn overlapping_fetches_settle_on_latest() {
        let feed = LocalFeed::new();
        let store = MemoryStore::with_feed(feed.clone());
        let ws = store.add_workstation("Telar 1", None);
        let order = store.add_order("OP-1", 100, "Jersey");
        let timer = store.start_timer_row(ws.id, order.id);
        store.set_read_delay(Some(Duration::from_millis(30)));

        let mut controller = ViewController::mount(&feed).unwrap();
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let mut done_tx = Some(done_tx);

        let writer = async {
            let actions = TimerActions::new(&store);
            actions.log_progress(timer, 10).await.unwrap();
            actions.log_progress(timer, 15).await.unwrap();
        };
        let view = drive(
            &store,
            &mut controller,
            async {
                let _ = done_rx.await;
            },
            |c| {
                if c.snapshots()[0].produced_total == 25
                    && let Some(tx) = done_tx.take()
                {
                    let _ = tx.send(());
                }
            },
        );

        tokio::time::timeout(Duration::from_secs(5), async { tokio::join!(view, writer) })
            .await
            .expect("view never settled");

        assert_eq!(controller.snapshots()[0].produced_total, 25);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_view_alive() {
        let feed = LocalFeed::new();
        let store = MemoryStore::with_feed(feed.clone());
        store.add_workstation("Telar 1", None);
        store.fail_next_reads(1);

        let mut controller = ViewController::mount(&feed).unwrap();
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let mut done_tx = Some(done_tx);
        let mut outcomes = Vec::new();

        let view = drive(
            &store,
            &mut controller,
            async {
                let _ = done_rx.await;
            },
            |c| {
                outcomes.push((c.state(), c.snapshots().len()));
                if let Some(tx) = done_tx.take() {
                    let _ = tx.send(());
                }
            },
        );

        tokio::time::timeout(Duration::from_secs(5), view)
            .await
            .expect("view never rendered");

        assert_eq!(outcomes, vec![(ViewState::Ready, 0)]);
        assert_eq!(controller.notices().count(), 1);
    }
}
