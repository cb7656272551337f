//! Tree → flat test-list compilation.
//!
//! A depth-first walk emits one [`CompiledTest`] per leaf, pairing it with
//! the hook cascade its lexical position implies: every enclosing describe's
//! `before_each` hooks outermost-first, and `after_each` hooks
//! innermost-first, registration order preserved within a describe. A hook
//! registered earlier therefore runs earlier in setup and later in teardown,
//! and inner describes fully nest within outer ones.

use std::sync::Arc;
use tracing::debug;

use crate::config::RunConfig;
use crate::spec::{Hook, Modifier, Spec, SpecNode};

/// One-time hooks for a describe's block of executed tests. Tests carry
/// their scope chain; the executor enters a scope before the first test that
/// needs it and leaves it after the last.
pub(crate) struct Scope {
    pub(crate) before_all: Vec<Hook>,
    pub(crate) after_all: Vec<Hook>,
}

/// A leaf test paired with its resolved cascades and effective flags.
pub struct CompiledTest {
    pub full_name: String,
    pub is_focused: bool,
    pub is_excluded: bool,
    pub(crate) body: Hook,
    pub(crate) before_cascade: Vec<Hook>,
    pub(crate) after_cascade: Vec<Hook>,
    pub(crate) scopes: Vec<Arc<Scope>>,
}

/// Flattens the given specs into an ordered test list. Test order follows
/// registration order, depth-first; compiling the same trees twice yields
/// identical lists.
pub fn compile(specs: &[Spec], config: &RunConfig) -> Vec<CompiledTest> {
    let mut tests = Vec::new();
    for spec in specs {
        let frame = Frame::root();
        walk_describe(&spec.root, &frame, config, &mut tests);
    }
    debug!(tests = tests.len(), "compiled spec tree");
    tests
}

struct Frame {
    names: Vec<String>,
    before: Vec<Hook>,
    after: Vec<Hook>,
    scopes: Vec<Arc<Scope>>,
    focused: bool,
    excluded: bool,
}

impl Frame {
    fn root() -> Self {
        Frame {
            names: Vec::new(),
            before: Vec::new(),
            after: Vec::new(),
            scopes: Vec::new(),
            focused: false,
            excluded: false,
        }
    }
}

fn walk_describe(
    node: &crate::spec::DescribeNode,
    parent: &Frame,
    config: &RunConfig,
    tests: &mut Vec<CompiledTest>,
) {
    let mut names = parent.names.clone();
    names.push(node.name.clone());

    let mut before = parent.before.clone();
    before.extend(node.before_each.iter().cloned());

    let mut after = node.after_each.clone();
    after.extend(parent.after.iter().cloned());

    let mut scopes = parent.scopes.clone();
    if !node.before_all.is_empty() || !node.after_all.is_empty() {
        scopes.push(Arc::new(Scope {
            before_all: node.before_all.clone(),
            after_all: node.after_all.clone(),
        }));
    }

    let frame = Frame {
        names,
        before,
        after,
        scopes,
        focused: parent.focused || node.modifier == Modifier::Focused,
        excluded: parent.excluded || node.modifier == Modifier::Excluded,
    };

    for child in &node.children {
        match child {
            SpecNode::Test(test) => {
                let mut full_name = frame.names.join(" ");
                full_name.push(' ');
                full_name.push_str(&test.name);
                if !config.matches(&full_name) {
                    continue;
                }
                tests.push(CompiledTest {
                    full_name,
                    is_focused: frame.focused || test.modifier == Modifier::Focused,
                    is_excluded: frame.excluded || test.modifier == Modifier::Excluded,
                    body: test.body.clone(),
                    before_cascade: frame.before.clone(),
                    after_cascade: frame.after.clone(),
                    scopes: frame.scopes.clone(),
                });
            }
            SpecNode::Describe(describe) => {
                walk_describe(describe, &frame, config, tests);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Body, Context};
    use parking_lot::Mutex;

    fn play_sync(hook: &Hook) {
        match hook.as_ref() {
            Body::Sync(f) => f(),
            Body::Async(_) => panic!("expected a sync hook"),
        }
    }

    fn tracer(trace: Arc<Mutex<String>>, token: &'static str) -> impl Fn() + Send + Sync + 'static {
        move || trace.lock().push_str(token)
    }

    fn nested_spec(trace: &Arc<Mutex<String>>) -> Spec {
        let (a, b, c) = (
            tracer(trace.clone(), "A"),
            tracer(trace.clone(), "B"),
            tracer(trace.clone(), "C"),
        );
        let (a2, b2, c2) = (
            tracer(trace.clone(), "A"),
            tracer(trace.clone(), "B"),
            tracer(trace.clone(), "C"),
        );
        Spec::build("outer", move |ctx| {
            ctx.before_each(a);
            ctx.before_each(b);
            ctx.after_each(b2);
            ctx.after_each(a2);
            ctx.describe("inner", move |ctx: Context| {
                ctx.before_each(c);
                ctx.after_each(c2);
                ctx.it("leaf", || {});
            });
        })
    }

    #[test]
    fn cascades_nest_with_registration_order_preserved() {
        let trace = Arc::new(Mutex::new(String::new()));
        let spec = nested_spec(&trace);
        let tests = compile(&[spec], &RunConfig::default());
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].full_name, "outer inner leaf");

        for hook in &tests[0].before_cascade {
            play_sync(hook);
        }
        for hook in &tests[0].after_cascade {
            play_sync(hook);
        }
        assert_eq!(*trace.lock(), "ABCCBA");
    }

    #[test]
    fn focus_and_exclusion_propagate_from_ancestors() {
        let spec = Spec::build("root", |ctx| {
            ctx.fdescribe("focused group", |ctx| {
                ctx.it("inherits focus", || {});
            });
            ctx.xdescribe("excluded group", |ctx| {
                ctx.fit("focused but excluded", || {});
            });
            ctx.it("plain", || {});
        });
        let tests = compile(&[spec], &RunConfig::default());

        assert!(tests[0].is_focused && !tests[0].is_excluded);
        assert!(tests[1].is_focused && tests[1].is_excluded);
        assert!(!tests[2].is_focused && !tests[2].is_excluded);
    }

    #[test]
    fn order_follows_registration_depth_first() {
        let spec = Spec::build("root", |ctx| {
            ctx.it("one", || {});
            ctx.describe("group", |ctx| {
                ctx.it("two", || {});
            });
            ctx.it("three", || {});
        });
        let tests = compile(&[spec], &RunConfig::default());
        let names: Vec<&str> = tests.iter().map(|t| t.full_name.as_str()).collect();
        assert_eq!(names, vec!["root one", "root group two", "root three"]);
    }

    #[test]
    fn compiling_twice_yields_identical_lists() {
        let build = || {
            Spec::build("stable", |ctx| {
                ctx.describe("group", |ctx| {
                    ctx.xit("skipped", || {});
                    ctx.it("kept", || {});
                });
            })
        };
        let first = compile(&[build()], &RunConfig::default());
        let second = compile(&[build()], &RunConfig::default());
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.full_name, b.full_name);
            assert_eq!(a.is_focused, b.is_focused);
            assert_eq!(a.is_excluded, b.is_excluded);
        }
    }

    #[test]
    fn filter_drops_non_matching_tests_at_compile_time() {
        let spec = Spec::build("root", |ctx| {
            ctx.it("wanted test", || {});
            ctx.it("other test", || {});
        });
        let config = RunConfig {
            filter: Some("wanted".to_string()),
            ..RunConfig::default()
        };
        let tests = compile(&[spec], &config);
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].full_name, "root wanted test");
    }

    #[test]
    fn scopes_chain_only_through_describes_with_one_time_hooks() {
        let spec = Spec::build("root", |ctx| {
            ctx.before_all(|| {});
            ctx.describe("plain", |ctx| {
                ctx.describe("scoped", |ctx| {
                    ctx.after_all(|| {});
                    ctx.it("leaf", || {});
                });
            });
        });
        let tests = compile(&[spec], &RunConfig::default());
        assert_eq!(tests[0].scopes.len(), 2);
    }
}
