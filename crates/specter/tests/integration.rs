use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use specter::prelude::*;
use specter::runner;

fn tracer(trace: Arc<Mutex<String>>, token: &'static str) -> impl Fn() + Send + Sync + 'static {
    move || trace.lock().push_str(token)
}

async fn execute(spec: Spec) -> Vec<TestResult> {
    let run = TestRun::from_specs(&[spec], &RunConfig::default());
    run.execute().await.expect("fresh run executes")
}

#[tokio::test]
async fn nested_hooks_cascade_outer_in_then_inner_out() {
    let trace = Arc::new(Mutex::new(String::new()));
    let (a, b, c) = (tracer(trace.clone(), "A"), tracer(trace.clone(), "B"), tracer(trace.clone(), "C"));
    let (a2, b2, c2) = (tracer(trace.clone(), "A"), tracer(trace.clone(), "B"), tracer(trace.clone(), "C"));

    let spec = Spec::build("outer", move |ctx| {
        ctx.before_each(a);
        ctx.before_each(b);
        ctx.after_each(b2);
        ctx.after_each(a2);
        ctx.describe("inner", move |ctx: Context| {
            ctx.before_each(c);
            ctx.after_each(c2);
            ctx.it("does nothing", || {});
        });
    });

    let results = execute(spec).await;
    assert_eq!(*trace.lock(), "ABCCBA");
    assert_eq!(results.len(), 1);
    assert!(results[0].outcome.is_passed());
    assert_eq!(results[0].full_name, "outer inner does nothing");
    assert_eq!(results[0].output, "Test completed successfully.\n");
}

#[tokio::test]
async fn focused_tests_skip_every_unfocused_sibling() {
    let spec = Spec::build("focus", |ctx| {
        ctx.fit("t1", || {});
        ctx.it("t2", || {});
        ctx.fit("t3", || {});
    });

    let results = execute(spec).await;
    assert!(results[0].outcome.is_passed());
    assert!(matches!(
        results[1].outcome,
        TestOutcome::Skipped(SkipReason::NotFocused)
    ));
    assert!(results[2].outcome.is_passed());
}

#[tokio::test]
async fn exclusion_dominates_focus() {
    let ran = Arc::new(AtomicU32::new(0));
    let body_ran = ran.clone();
    let spec = Spec::build("exclusion", move |ctx| {
        ctx.xdescribe("excluded group", move |ctx: Context| {
            ctx.fit("focused but excluded", move || {
                body_ran.fetch_add(1, Ordering::SeqCst);
            });
        });
    });

    let results = execute(spec).await;
    assert!(matches!(
        results[0].outcome,
        TestOutcome::Skipped(SkipReason::Excluded)
    ));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn a_focused_excluded_test_still_counts_for_the_focus_census() {
    let spec = Spec::build("census", |ctx| {
        ctx.xdescribe("excluded", |ctx| {
            ctx.fit("focused inside exclusion", || {});
        });
        ctx.it("plain", || {});
    });

    let results = execute(spec).await;
    assert!(matches!(
        results[0].outcome,
        TestOutcome::Skipped(SkipReason::Excluded)
    ));
    assert!(matches!(
        results[1].outcome,
        TestOutcome::Skipped(SkipReason::NotFocused)
    ));
}

#[tokio::test]
async fn before_all_and_after_all_run_once_around_the_block() {
    let trace = Arc::new(Mutex::new(String::new()));
    let (setup, teardown) = (tracer(trace.clone(), "["), tracer(trace.clone(), "]"));
    let (t1, t2) = (tracer(trace.clone(), "1"), tracer(trace.clone(), "2"));

    let spec = Spec::build("block", move |ctx| {
        ctx.describe("scoped", move |ctx: Context| {
            ctx.before_all(setup);
            ctx.after_all(teardown);
            ctx.it("first", t1);
            ctx.it("second", t2);
        });
    });

    let results = execute(spec).await;
    assert_eq!(results.len(), 2);
    assert_eq!(*trace.lock(), "[12]");
}

#[tokio::test]
async fn fully_skipped_describes_never_enter_their_scope() {
    let entered = Arc::new(AtomicU32::new(0));
    let (enter, leave) = (entered.clone(), entered.clone());

    let spec = Spec::build("skipped scope", move |ctx| {
        ctx.xdescribe("never runs", move |ctx: Context| {
            ctx.before_all(move || {
                enter.fetch_add(1, Ordering::SeqCst);
            });
            ctx.after_all(move || {
                leave.fetch_add(1, Ordering::SeqCst);
            });
            ctx.it("excluded", || {});
        });
    });

    let results = execute(spec).await;
    assert!(results[0].outcome.is_skipped());
    assert_eq!(entered.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn async_bodies_and_hooks_interleave_with_sync_ones() {
    let trace = Arc::new(Mutex::new(String::new()));
    let before = trace.clone();
    let body = trace.clone();
    let after = tracer(trace.clone(), "a");

    let spec = Spec::build("async", move |ctx| {
        ctx.before_each_async(move || {
            let trace = before.clone();
            async move {
                tokio::task::yield_now().await;
                trace.lock().push('b');
            }
        });
        ctx.after_each(after);
        ctx.it_async("awaits its body", move || {
            let trace = body.clone();
            async move {
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                trace.lock().push('t');
            }
        });
    });

    let results = execute(spec).await;
    assert!(results[0].outcome.is_passed());
    assert_eq!(*trace.lock(), "bta");
    assert!(results[0].duration >= std::time::Duration::from_millis(1));
}

#[tokio::test]
async fn test_output_is_captured_per_test() {
    let spec = Spec::build("output", |ctx| {
        ctx.it("writes lines", || {
            specter::context::write_line("first line");
            specter::context::write_line("second line");
        });
        ctx.it("stays clean", || {});
    });

    let results = execute(spec).await;
    assert_eq!(
        results[0].output,
        "first line\nsecond line\nTest completed successfully.\n"
    );
    assert_eq!(results[1].output, "Test completed successfully.\n");
}

#[tokio::test]
async fn the_context_exposes_the_running_test_identity() {
    let seen = Arc::new(Mutex::new(String::new()));
    let sink = seen.clone();
    let spec = Spec::build("identity", move |ctx| {
        ctx.describe("group", move |ctx: Context| {
            ctx.it("knows its name", move || {
                let current = specter::context::current().expect("inside a test");
                sink.lock().push_str(current.full_name());
            });
        });
    });

    execute(spec).await;
    assert_eq!(*seen.lock(), "identity group knows its name");
}

#[tokio::test]
async fn filtered_compilation_drops_non_matching_tests() {
    let spec = Spec::build("filterable", |ctx| {
        ctx.it("wanted test", || {});
        ctx.it("other test", || {});
    });
    let config = RunConfig {
        filter: Some("wanted".to_string()),
        ..RunConfig::default()
    };
    let run = TestRun::from_specs(&[spec], &config);
    let names: Vec<&str> = run.tests().iter().map(|t| t.full_name.as_str()).collect();
    assert_eq!(names, vec!["filterable wanted test"]);
}

// ---- link-time discovery ------------------------------------------------

fn define_zeta(ctx: Context) {
    ctx.it("registered late", || {});
}

fn define_alpha(ctx: Context) {
    ctx.it("registered early", || {});
}

inventory::submit! {
    SpecRegistration { name: "zeta spec", define: define_zeta }
}

inventory::submit! {
    SpecRegistration { name: "alpha spec", define: define_alpha }
}

#[tokio::test]
async fn discovery_collects_registered_specs_in_name_order() {
    let run = runner::discover_with(&RunConfig::default());
    let names: Vec<&str> = run.tests().iter().map(|t| t.full_name.as_str()).collect();
    assert_eq!(
        names,
        vec!["alpha spec registered early", "zeta spec registered late"]
    );

    let results = run.execute().await.expect("discovered run executes");
    assert!(results.iter().all(|r| r.outcome.is_passed()));
}
