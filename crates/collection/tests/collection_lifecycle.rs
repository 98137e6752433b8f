//! End-to-end lifecycle tests for `Collection`, run against members of both
//! calling conventions and driven through both of the collection's own APIs.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use rstest::rstest;
use tandem_collection::{
    Capabilities, Collection, CollectionConfig, Error, Lifecycle, Operation, Resource, Result,
    Supports,
};
use tandem_resource::testing::{CallLog, MockResource};
use tokio::sync::oneshot;

/// How the test drives the collection itself.
#[derive(Debug, Clone, Copy)]
enum Api {
    Async,
    Continuation,
}

async fn open(collection: &Collection, api: Api) -> Result<()> {
    match api {
        Api::Async => collection.open().await,
        Api::Continuation => {
            let (tx, rx) = oneshot::channel();
            collection.open_with(move |result| {
                let _ = tx.send(result);
            });
            rx.await.expect("open completion called")
        }
    }
}

async fn close(collection: &Collection, api: Api) -> Result<()> {
    match api {
        Api::Async => collection.close(false).await,
        Api::Continuation => {
            let (tx, rx) = oneshot::channel();
            collection.close_with(false, move |result| {
                let _ = tx.send(result);
            });
            rx.await.expect("close completion called")
        }
    }
}

async fn destroy(collection: &Collection, reason: Option<Error>, api: Api) -> Result<()> {
    match api {
        Api::Async => collection.destroy(reason).await,
        Api::Continuation => {
            let (tx, rx) = oneshot::channel();
            collection.destroy_with(reason, move |result| {
                let _ = tx.send(result);
            });
            rx.await.expect("destroy completion called")
        }
    }
}

fn mock(name: &str, log: &CallLog, supports: Supports) -> MockResource {
    MockResource::new(name, log).with_supports(supports)
}

fn shared(mocks: &[&MockResource]) -> Vec<Arc<dyn Resource>> {
    mocks.iter().map(|m| m.shared()).collect()
}

#[rstest]
#[tokio::test]
async fn empty_collection_opens_and_closes(#[values(Api::Async, Api::Continuation)] api: Api) {
    tandem_log::init_test();
    let collection = Collection::default();

    open(&collection, api).await.unwrap();
    assert!(collection.is_opened());
    close(&collection, api).await.unwrap();
    assert!(collection.is_closed());
}

#[rstest]
#[tokio::test]
async fn opens_in_order_even_when_early_members_are_slow(
    #[values(Supports::CALLBACKS, Supports::DEFERRED)] supports: Supports,
    #[values(Api::Async, Api::Continuation)] api: Api,
) {
    tandem_log::init_test();
    let log = CallLog::new();
    let a = mock("a", &log, supports).with_delay(Duration::from_millis(30));
    let b = mock("b", &log, supports).with_delay(Duration::from_millis(1));
    let c = mock("c", &log, supports).with_delay(Duration::from_millis(10));
    let collection = Collection::new(shared(&[&a, &b, &c]));

    open(&collection, api).await.unwrap();

    assert_eq!(log.started(Operation::Open), ["a", "b", "c"]);
    assert!(log.is_serial());
    assert!(a.is_opened() && b.is_opened() && c.is_opened());
    assert!(collection.is_opened());
    assert!(!collection.is_closed());
}

#[rstest]
#[tokio::test]
async fn closes_in_reverse_order(
    #[values(Supports::CALLBACKS, Supports::DEFERRED)] supports: Supports,
    #[values(Api::Async, Api::Continuation)] api: Api,
) {
    let log = CallLog::new();
    let a = mock("a", &log, supports).with_delay(Duration::from_millis(20));
    let b = mock("b", &log, supports);
    let c = mock("c", &log, supports).with_delay(Duration::from_millis(5));
    let collection = Collection::new(shared(&[&a, &b, &c]));

    open(&collection, api).await.unwrap();
    log.clear();
    close(&collection, api).await.unwrap();

    assert_eq!(log.started(Operation::Close), ["c", "b", "a"]);
    assert!(log.is_serial());
    assert!(a.is_closed() && b.is_closed() && c.is_closed());
    assert!(collection.is_closed());
    assert!(!collection.is_opened());
}

#[rstest]
#[tokio::test]
async fn members_without_an_operation_are_skipped(#[values(Api::Async, Api::Continuation)] api: Api) {
    let log = CallLog::new();
    let open_only = MockResource::new("open_only", &log).with_capabilities(Capabilities::open_only());
    let close_only =
        MockResource::new("close_only", &log).with_capabilities(Capabilities::close_only());
    let inert = MockResource::new("inert", &log).with_capabilities(Capabilities::none());
    let collection = Collection::new(shared(&[&open_only, &close_only, &inert]));

    open(&collection, api).await.unwrap();
    assert_eq!(log.started(Operation::Open), ["open_only"]);

    close(&collection, api).await.unwrap();
    assert_eq!(log.started(Operation::Close), ["close_only"]);
    assert!(collection.is_closed());
}

#[rstest]
#[tokio::test]
async fn failed_open_rolls_back_opened_members(
    #[values(Supports::CALLBACKS, Supports::DEFERRED)] supports: Supports,
    #[values(Api::Async, Api::Continuation)] api: Api,
) {
    let log = CallLog::new();
    let members: Vec<MockResource> = (0..4)
        .map(|i| mock(&format!("m{i}"), &log, supports))
        .chain(std::iter::once(
            mock("broken", &log, supports).failing_open("test"),
        ))
        .chain((5..8).map(|i| mock(&format!("m{i}"), &log, supports)))
        .collect();
    let collection = Collection::new(members.iter().map(MockResource::shared));

    let err = open(&collection, api).await.unwrap_err();

    assert_eq!(err.to_string(), "test");
    assert_eq!(log.started(Operation::Open), ["m0", "m1", "m2", "m3", "broken"]);
    assert_eq!(log.started(Operation::Close), ["m3", "m2", "m1", "m0"]);
    assert!(log.is_serial());
    assert!(members[..4].iter().all(|m| m.is_closed()));
    assert!(members[5..].iter().all(|m| !m.is_opened() && !m.is_closed()));
    assert_eq!(collection.state(), Lifecycle::Unopened);
    assert!(!collection.is_opened());
    assert!(!collection.is_closed());
    assert!(collection.take_rollback_errors().is_empty());
}

#[rstest]
#[tokio::test]
async fn only_the_first_open_error_is_reported(
    #[values(Supports::CALLBACKS, Supports::DEFERRED)] supports: Supports,
) {
    let log = CallLog::new();
    let first = mock("first", &log, supports).failing_open("test1");
    let second = mock("second", &log, supports).failing_open("test2");
    let collection = Collection::new(shared(&[&first, &second]));

    let err = collection.open().await.unwrap_err();

    assert_eq!(err.to_string(), "test1");
    assert!(!err.is_aggregate());
    assert_eq!(log.count("second", Operation::Open), 0);
    assert!(log.started(Operation::Close).is_empty());
}

#[tokio::test]
async fn open_can_be_retried_after_a_failure() {
    let log = CallLog::new();
    let a = MockResource::new("a", &log);
    let flaky = MockResource::new("flaky", &log).failing_open("not yet");
    let collection = Collection::new(shared(&[&a, &flaky]));

    collection.open().await.unwrap_err();
    assert_eq!(collection.state(), Lifecycle::Unopened);

    // Members can be appended between attempts.
    let late = MockResource::new("late", &log);
    collection.push(late.shared());
    let err = collection.open().await.unwrap_err();
    assert_eq!(err.to_string(), "not yet");
    assert_eq!(log.count("flaky", Operation::Open), 2);
    assert_eq!(log.count("late", Operation::Open), 0);
}

#[rstest]
#[tokio::test]
async fn close_reports_every_failure(
    #[values(Supports::CALLBACKS, Supports::DEFERRED)] supports: Supports,
    #[values(Api::Async, Api::Continuation)] api: Api,
) {
    let log = CallLog::new();
    let a = mock("a", &log, supports).failing_close("test1");
    let b = mock("b", &log, supports);
    let c = mock("c", &log, supports).failing_close("test2");
    let collection = Collection::new(shared(&[&a, &b, &c]));

    open(&collection, api).await.unwrap();
    let err = close(&collection, api).await.unwrap_err();

    assert_eq!(err.to_string(), "test2; test1");
    assert!(err.is_aggregate());
    assert_eq!(log.started(Operation::Close), ["c", "b", "a"]);
    assert!(b.is_closed());
    assert!(collection.is_closed());
}

#[rstest]
#[tokio::test]
async fn destroy_lists_the_reason_first(#[values(Api::Async, Api::Continuation)] api: Api) {
    let log = CallLog::new();
    let a = MockResource::new("a", &log).failing_close("test1");
    let b = MockResource::new("b", &log).failing_close("test2");
    let collection = Collection::new(shared(&[&a, &b]));

    open(&collection, api).await.unwrap();
    let err = destroy(&collection, Some(Error::failed("abc")), api)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "abc; test2; test1");
    let parts: Vec<String> = err.constituents().iter().map(ToString::to_string).collect();
    assert_eq!(parts, ["abc", "test2", "test1"]);
    assert_eq!(collection.state(), Lifecycle::Closed);
}

#[rstest]
#[tokio::test]
async fn destroy_of_an_unopened_collection_returns_the_reason(
    #[values(Api::Async, Api::Continuation)] api: Api,
) {
    let log = CallLog::new();
    let a = MockResource::new("a", &log);
    let collection = Collection::new(shared(&[&a]));

    let err = destroy(&collection, Some(Error::failed("test")), api)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "test");
    assert!(!err.is_aggregate());
    assert!(collection.is_closed());
    assert!(log.calls().is_empty());
}

#[tokio::test]
async fn destroy_without_reason_after_clean_close_is_ok() {
    let log = CallLog::new();
    let collection = Collection::new(shared(&[&MockResource::new("a", &log)]));

    collection.open().await.unwrap();
    collection.destroy(None).await.unwrap();
    assert!(collection.is_closed());
    assert_eq!(log.started(Operation::Close), ["a"]);
}

#[tokio::test]
async fn close_of_an_unopened_collection_touches_no_member() {
    let log = CallLog::new();
    let collection = Collection::new(shared(&[&MockResource::new("a", &log)]));

    collection.close(false).await.unwrap();
    assert!(collection.is_closed());
    assert!(log.calls().is_empty());
    assert!(collection.open().await.unwrap_err().is_closed());
}

#[tokio::test]
async fn initially_opened_collection_still_runs_an_explicit_open() {
    let log = CallLog::new();
    let a = MockResource::new("a", &log);
    let b = MockResource::new("b", &log);
    let collection =
        Collection::with_config(CollectionConfig::new().opened(true), shared(&[&a, &b])).unwrap();

    assert!(collection.is_opened());
    collection.open().await.unwrap();
    assert_eq!(log.started(Operation::Open), ["a", "b"]);

    // A second open after a real pass is a no-op.
    collection.open().await.unwrap();
    assert_eq!(log.count("a", Operation::Open), 1);
}

#[tokio::test]
async fn initially_opened_collection_can_close_directly() {
    let log = CallLog::new();
    let a = MockResource::new("a", &log).already_opened();
    let collection =
        Collection::with_config(CollectionConfig::new().opened(true), shared(&[&a])).unwrap();

    collection.close(false).await.unwrap();
    assert_eq!(log.started(Operation::Close), ["a"]);
    assert!(a.is_closed());
    assert!(collection.is_closed());
}

#[tokio::test]
async fn members_already_in_the_target_phase_are_skipped() {
    let log = CallLog::new();
    let opened = MockResource::new("opened", &log).already_opened();
    let fresh = MockResource::new("fresh", &log);
    let collection = Collection::new(shared(&[&opened, &fresh]));

    collection.open().await.unwrap();
    assert_eq!(log.started(Operation::Open), ["fresh"]);

    opened.set_closed(true);
    collection.close(false).await.unwrap();
    assert_eq!(log.started(Operation::Close), ["fresh"]);
}

#[tokio::test]
async fn abandoned_completion_fails_the_open() {
    let log = CallLog::new();
    let a = MockResource::new("a", &log);
    let ghost = MockResource::new("ghost", &log).abandoning();
    let collection = Collection::new(shared(&[&a, &ghost]));

    let err = collection.open().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Abandoned {
            operation: Operation::Open
        }
    ));
    assert_eq!(log.started(Operation::Close), ["a"]);
}

#[rstest]
#[case::callbacks(Supports::CALLBACKS)]
#[case::deferred(Supports::DEFERRED)]
#[case::both(Supports::BOTH)]
#[tokio::test]
async fn nested_collections_open_and_close_as_members(#[case] supports: Supports) {
    let log = CallLog::new();
    let a = MockResource::new("a", &log);
    let b = MockResource::new("b", &log);
    let c = MockResource::new("c", &log);
    let inner = Collection::with_config(
        CollectionConfig::new().named("inner").supports(supports),
        shared(&[&b, &c]),
    )
    .unwrap();
    let outer = Collection::new([a.shared(), Arc::new(inner.clone()) as Arc<dyn Resource>]);

    outer.open().await.unwrap();
    assert!(inner.is_opened());
    assert_eq!(log.started(Operation::Open), ["a", "b", "c"]);

    outer.close(false).await.unwrap();
    assert!(inner.is_closed());
    assert_eq!(log.started(Operation::Close), ["c", "b", "a"]);
}

#[tokio::test]
async fn nested_failure_rolls_back_the_outer_collection() {
    let log = CallLog::new();
    let a = MockResource::new("a", &log);
    let b = MockResource::new("b", &log);
    let broken = MockResource::new("broken", &log).failing_open("inner boom");
    let inner = Collection::new(shared(&[&b, &broken]));
    let outer = Collection::new([a.shared(), Arc::new(inner.clone()) as Arc<dyn Resource>]);

    let err = outer.open().await.unwrap_err();
    assert_eq!(err.to_string(), "inner boom");
    assert_eq!(inner.state(), Lifecycle::Unopened);
    assert_eq!(log.started(Operation::Close), ["b", "a"]);
}

#[tokio::test]
async fn members_added_during_a_pass_wait_for_the_next_one() {
    let log = CallLog::new();
    let slow = MockResource::new("slow", &log).with_delay(Duration::from_millis(50));
    let collection = Collection::new(shared(&[&slow]));

    let pass = tokio::spawn({
        let collection = collection.clone();
        async move { collection.open().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    let late = MockResource::new("late", &log);
    collection.push(late.shared());
    pass.await.unwrap().unwrap();

    assert_eq!(log.started(Operation::Open), ["slow"]);
    assert!(!late.is_opened());

    collection.close(false).await.unwrap();
    assert_eq!(log.started(Operation::Close), ["late", "slow"]);
}

#[tokio::test]
async fn close_issued_during_open_waits_for_it() {
    let log = CallLog::new();
    let a = MockResource::new("a", &log).with_delay(Duration::from_millis(20));
    let b = MockResource::new("b", &log).with_delay(Duration::from_millis(20));
    let collection = Collection::new(shared(&[&a, &b]));

    let opening = tokio::spawn({
        let collection = collection.clone();
        async move { collection.open().await }
    });
    tokio::time::sleep(Duration::from_millis(5)).await;
    collection.close(false).await.unwrap();
    opening.await.unwrap().unwrap();

    assert!(log.is_serial());
    assert_eq!(log.started(Operation::Open), ["a", "b"]);
    assert_eq!(log.started(Operation::Close), ["b", "a"]);
    assert!(collection.is_closed());
}

#[tokio::test]
async fn close_waits_for_active_uses() {
    let log = CallLog::new();
    let collection = Collection::new(shared(&[&MockResource::new("a", &log)]));
    collection.open().await.unwrap();

    let (tx, rx) = oneshot::channel::<()>();
    let holder = tokio::spawn({
        let collection = collection.clone();
        async move {
            let _guard = collection.active().unwrap();
            let _ = rx.await;
        }
    });
    tokio::time::sleep(Duration::from_millis(5)).await;

    let closing = tokio::spawn({
        let collection = collection.clone();
        async move { collection.close(false).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!closing.is_finished());
    assert!(log.started(Operation::Close).is_empty());

    tx.send(()).unwrap();
    holder.await.unwrap();
    closing.await.unwrap().unwrap();
    assert!(collection.is_closed());
}

#[tokio::test]
async fn allow_active_lets_the_caller_close_from_inside_a_use() {
    let log = CallLog::new();
    let collection = Collection::new(shared(&[&MockResource::new("a", &log)]));
    collection.open().await.unwrap();

    let guard = collection.active().unwrap();
    tokio::time::timeout(Duration::from_secs(1), collection.close(true))
        .await
        .expect("close with allow_active does not wait for its own use")
        .unwrap();
    drop(guard);

    assert!(collection.is_closed());
    assert!(collection.active().unwrap_err().is_closed());
}

#[tokio::test]
async fn concurrent_opens_share_one_pass() {
    let log = CallLog::new();
    let a = MockResource::new("a", &log).with_delay(Duration::from_millis(10));
    let b = MockResource::new("b", &log);
    let collection = Collection::new(shared(&[&a, &b]));

    let results = futures::future::join_all((0..4).map(|_| collection.open())).await;

    assert!(results.iter().all(|result| result.is_ok()));
    assert_eq!(log.count("a", Operation::Open), 1);
    assert_eq!(log.count("b", Operation::Open), 1);
    assert!(log.is_serial());
}
