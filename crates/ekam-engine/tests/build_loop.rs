//! End-to-end build-loop scenarios driven entirely through [`Engine`]'s
//! public surface, with custom in-process rules standing in for real
//! subprocess-backed ones.

#![allow(clippy::unwrap_used)]

use ekam_app_core::EngineConfig;
use ekam_core::Tag;
use ekam_dashboard::ConsoleDashboard;
use ekam_driver::{Action, ActionContext, ActionFactory};
use ekam_engine::Engine;
use ekam_fs::{Artifact, DiskArtifact};
use ekam_graph::InstallLocation;
use std::path::Path;
use std::sync::Arc;

fn engine_over(root: &Path) -> Engine {
    let config = EngineConfig::new(root.to_path_buf());
    Engine::new(config, Box::new(ConsoleDashboard::new(None, true)))
}

fn write_source(root: &Path, name: &str, content: &[u8]) {
    let path = root.join("src").join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn source(root: &Path, name: &str) -> Box<dyn Artifact> {
    Box::new(DiskArtifact::new(Arc::new(root.join("src")), name.to_string(), true))
}

// Scenario 1: a single source file drives a single rule to a fresh,
// tagged output artifact.
#[derive(Debug)]
struct ObjectAction {
    source: Box<dyn Artifact>,
}

impl Action for ObjectAction {
    fn verb(&self) -> &str {
        "compile"
    }
    fn start(&mut self, ctx: &mut dyn ActionContext) {
        let Ok(out) = ctx.new_output("out.o") else {
            ctx.failed("scratch setup failed");
            return;
        };
        if out.write_all(b"obj").is_err() {
            ctx.failed("write failed");
            return;
        }
        let name = self.source.canonical_name().to_string();
        ctx.provide(out.clone_box(), vec![Tag::from_name(&format!("object:{name}"))]);
        ctx.install(out.as_ref(), InstallLocation::Bin, "a.o".to_string());
        ctx.passed();
    }
}

#[derive(Debug)]
struct ObjectFactory;

impl ActionFactory for ObjectFactory {
    fn trigger_tags(&self) -> Vec<Tag> {
        vec![Tag::from_name("filetype:.cpp")]
    }
    fn try_make_action(&self, _tag: Tag, artifact: &dyn Artifact) -> Option<Box<dyn Action>> {
        Some(Box::new(ObjectAction {
            source: artifact.clone_box(),
        }))
    }
}

#[test]
fn single_source_file_drives_its_rule_to_fixpoint() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path(), "a.cpp", b"int main(){}");

    let mut engine = engine_over(dir.path());
    engine.add_action_factory(Box::new(ObjectFactory));
    engine.add_source_file(source(dir.path(), "a.cpp"));

    assert!(engine.run_to_fixpoint());
    assert!(!engine.has_failed_drivers());
    assert_eq!(std::fs::read(dir.path().join("bin/a.o")).unwrap(), b"obj");
}

// Scenario 2: a lookup that fails for lack of a provider fails its driver;
// adding the missing source later resets and re-runs it to success.
#[derive(Debug)]
struct RequestAction;

impl Action for RequestAction {
    fn verb(&self) -> &str {
        "request"
    }
    fn start(&mut self, ctx: &mut dyn ActionContext) {
        match ctx.find_provider(Tag::from_name("header:missing.h")) {
            Some(_) => ctx.passed(),
            None => ctx.failed("header:missing.h has no provider"),
        }
    }
}

#[derive(Debug)]
struct RequestFactory;

impl ActionFactory for RequestFactory {
    fn trigger_tags(&self) -> Vec<Tag> {
        vec![Tag::from_name("filetype:.c")]
    }
    fn try_make_action(&self, _tag: Tag, _artifact: &dyn Artifact) -> Option<Box<dyn Action>> {
        Some(Box::new(RequestAction))
    }
}

#[derive(Debug)]
struct HeaderTagAction {
    source: Box<dyn Artifact>,
    tag: Tag,
}

impl Action for HeaderTagAction {
    fn verb(&self) -> &str {
        "tag-header"
    }
    fn start(&mut self, ctx: &mut dyn ActionContext) {
        ctx.provide(self.source.clone_box(), vec![self.tag]);
        ctx.passed();
    }
}

#[derive(Debug)]
struct HeaderTagFactory;

impl ActionFactory for HeaderTagFactory {
    fn trigger_tags(&self) -> Vec<Tag> {
        vec![Tag::from_name("filetype:.h")]
    }
    fn try_make_action(&self, _tag: Tag, artifact: &dyn Artifact) -> Option<Box<dyn Action>> {
        let tag = Tag::from_name(&format!("header:{}", artifact.basename()));
        Some(Box::new(HeaderTagAction {
            source: artifact.clone_box(),
            tag,
        }))
    }
}

#[test]
fn missing_provider_fails_then_adding_it_resets_and_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path(), "consumer.c", b"");

    let mut engine = engine_over(dir.path());
    engine.add_action_factory(Box::new(RequestFactory));
    engine.add_action_factory(Box::new(HeaderTagFactory));
    engine.add_source_file(source(dir.path(), "consumer.c"));

    assert!(!engine.run_to_fixpoint());
    assert!(engine.has_failed_drivers());

    write_source(dir.path(), "missing.h", b"");
    engine.add_source_file(source(dir.path(), "missing.h"));

    assert!(engine.run_to_fixpoint());
    assert!(!engine.has_failed_drivers());
}

// Scenario 4: among several providers of the same tag, the one with the
// longest path prefix shared with the consumer wins; ties break to the
// shallower path.
#[derive(Debug)]
struct ConsumerAction;

impl Action for ConsumerAction {
    fn verb(&self) -> &str {
        "consume"
    }
    fn start(&mut self, ctx: &mut dyn ActionContext) {
        let winner = ctx.find_provider(Tag::from_name("header:util.h"));
        let name = winner.map(|a| a.canonical_name().to_string()).unwrap_or_default();
        if let Ok(out) = ctx.new_output("winner.txt") {
            let _ = out.write_all(name.as_bytes());
            ctx.install(out.as_ref(), InstallLocation::Bin, "winner".to_string());
        }
        ctx.passed();
    }
}

#[derive(Debug)]
struct ConsumerFactory;

impl ActionFactory for ConsumerFactory {
    fn trigger_tags(&self) -> Vec<Tag> {
        vec![Tag::from_name("filetype:.c")]
    }
    fn try_make_action(&self, _tag: Tag, _artifact: &dyn Artifact) -> Option<Box<dyn Action>> {
        Some(Box::new(ConsumerAction))
    }
}

#[test]
fn preferred_provider_ties_break_by_shared_prefix_then_depth() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path(), "a/main.c", b"");
    write_source(dir.path(), "a/util.h", b"shallow");
    write_source(dir.path(), "a/b/util.h", b"deep");

    let mut engine = engine_over(dir.path());
    engine.add_action_factory(Box::new(ConsumerFactory));
    engine.add_action_factory(Box::new(HeaderTagFactory));
    engine.add_source_file(source(dir.path(), "a/util.h"));
    engine.add_source_file(source(dir.path(), "a/b/util.h"));
    engine.add_source_file(source(dir.path(), "a/main.c"));

    assert!(engine.run_to_fixpoint());
    assert!(!engine.has_failed_drivers());
    assert_eq!(std::fs::read_to_string(dir.path().join("bin/winner")).unwrap(), "a/util.h");
}

// Scenario 5: a rule can register a new rule type at runtime; the new
// factory retroactively matches provisions that already existed, and
// removing whatever depended on the driver that injected it tears the
// injected factory (and everything it spawned, including its install)
// back down.
#[derive(Debug)]
struct ProtoAction;

impl Action for ProtoAction {
    fn verb(&self) -> &str {
        "proto"
    }
    fn start(&mut self, ctx: &mut dyn ActionContext) {
        if let Ok(out) = ctx.new_output("marker") {
            let _ = out.write_all(b"ran");
            ctx.install(out.as_ref(), InstallLocation::Bin, "proto-marker".to_string());
        }
        ctx.passed();
    }
}

#[derive(Debug)]
struct ProtoFactory;

impl ActionFactory for ProtoFactory {
    fn trigger_tags(&self) -> Vec<Tag> {
        vec![Tag::from_name("filetype:.proto")]
    }
    fn try_make_action(&self, _tag: Tag, _artifact: &dyn Artifact) -> Option<Box<dyn Action>> {
        Some(Box::new(ProtoAction))
    }
}

#[derive(Debug)]
struct InjectorAction;

impl Action for InjectorAction {
    fn verb(&self) -> &str {
        "inject"
    }
    fn start(&mut self, ctx: &mut dyn ActionContext) {
        // Recorded purely so removing build.cfg resets this driver too.
        let _ = ctx.find_provider(Tag::from_name("config:build"));
        ctx.add_action_type(Box::new(ProtoFactory));
        ctx.passed();
    }
}

#[derive(Debug)]
struct InjectorFactory;

impl ActionFactory for InjectorFactory {
    fn trigger_tags(&self) -> Vec<Tag> {
        vec![Tag::from_name("filetype:.trigger")]
    }
    fn try_make_action(&self, _tag: Tag, _artifact: &dyn Artifact) -> Option<Box<dyn Action>> {
        Some(Box::new(InjectorAction))
    }
}

#[derive(Debug)]
struct ConfigTagAction {
    source: Box<dyn Artifact>,
}

impl Action for ConfigTagAction {
    fn verb(&self) -> &str {
        "tag-config"
    }
    fn start(&mut self, ctx: &mut dyn ActionContext) {
        ctx.provide(self.source.clone_box(), vec![Tag::from_name("config:build")]);
        ctx.passed();
    }
}

#[derive(Debug)]
struct ConfigTagFactory;

impl ActionFactory for ConfigTagFactory {
    fn trigger_tags(&self) -> Vec<Tag> {
        vec![Tag::from_name("filetype:.cfg")]
    }
    fn try_make_action(&self, _tag: Tag, artifact: &dyn Artifact) -> Option<Box<dyn Action>> {
        Some(Box::new(ConfigTagAction {
            source: artifact.clone_box(),
        }))
    }
}

#[test]
fn runtime_injected_factory_retroactively_matches_and_is_torn_down_with_its_owner() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path(), "a.proto", b"message Foo {}");
    write_source(dir.path(), "z.trigger", b"");
    write_source(dir.path(), "build.cfg", b"");

    let mut engine = engine_over(dir.path());
    engine.add_action_factory(Box::new(InjectorFactory));
    engine.add_action_factory(Box::new(ConfigTagFactory));
    engine.add_source_file(source(dir.path(), "a.proto"));
    engine.add_source_file(source(dir.path(), "z.trigger"));
    engine.add_source_file(source(dir.path(), "build.cfg"));

    assert!(engine.run_to_fixpoint());
    assert!(!engine.has_failed_drivers());
    assert!(dir.path().join("bin/proto-marker").exists());

    engine.remove_source_file("build.cfg");
    assert!(!dir.path().join("bin/proto-marker").exists());
}

// Scenario 6: installing, then resetting the installing driver, removes
// the stale link before the driver is allowed to re-run.
#[derive(Debug)]
struct InstallAction {
    source: Box<dyn Artifact>,
}

impl Action for InstallAction {
    fn verb(&self) -> &str {
        "install"
    }
    fn start(&mut self, ctx: &mut dyn ActionContext) {
        let _ = ctx.find_provider(Tag::from_name("config:build"));
        let Ok(out) = ctx.new_output("tool") else {
            ctx.failed("scratch setup failed");
            return;
        };
        let _ = out.write_all(self.source.canonical_name().as_bytes());
        ctx.install(out.as_ref(), InstallLocation::Bin, "mytool".to_string());
        ctx.passed();
    }
}

#[derive(Debug)]
struct InstallFactory;

impl ActionFactory for InstallFactory {
    fn trigger_tags(&self) -> Vec<Tag> {
        vec![Tag::from_name("filetype:.tool")]
    }
    fn try_make_action(&self, _tag: Tag, artifact: &dyn Artifact) -> Option<Box<dyn Action>> {
        Some(Box::new(InstallAction {
            source: artifact.clone_box(),
        }))
    }
}

#[test]
fn resetting_an_installing_driver_removes_the_stale_link_before_it_reruns() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path(), "thing.tool", b"");
    write_source(dir.path(), "build.cfg", b"");

    let mut engine = engine_over(dir.path());
    engine.add_action_factory(Box::new(InstallFactory));
    engine.add_action_factory(Box::new(ConfigTagFactory));
    engine.add_source_file(source(dir.path(), "thing.tool"));
    engine.add_source_file(source(dir.path(), "build.cfg"));

    assert!(engine.run_to_fixpoint());
    assert!(dir.path().join("bin/mytool").exists());

    engine.remove_source_file("build.cfg");
    assert!(!dir.path().join("bin/mytool").exists());

    engine.add_source_file(source(dir.path(), "build.cfg"));
    assert!(engine.run_to_fixpoint());
    assert!(dir.path().join("bin/mytool").exists());
}
