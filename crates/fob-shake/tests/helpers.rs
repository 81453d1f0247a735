//! Shared test utilities for fob-shake integration tests.

#![allow(dead_code)]

use fob_shake::{
    ModuleGraph, ModuleId, ShakeReport, SourceGraphLoader, TreeShakeConfig, TreeShaker,
};

pub fn id(path: &str) -> ModuleId {
    ModuleId::new(path).expect("module id")
}

/// Build a graph from `(path, code)` pairs; the first pair is the entry point.
pub fn graph(modules: &[(&str, &str)]) -> ModuleGraph {
    let mut loader = SourceGraphLoader::new();
    for (index, (path, code)) in modules.iter().enumerate() {
        loader = if index == 0 {
            loader.entry(path, *code)
        } else {
            loader.source(path, *code)
        };
    }
    loader.build().expect("graph")
}

pub async fn shake(graph: &mut ModuleGraph) -> ShakeReport {
    shake_with(graph, TreeShakeConfig::default()).await
}

pub async fn shake_with(graph: &mut ModuleGraph, config: TreeShakeConfig) -> ShakeReport {
    TreeShaker::with_config(config)
        .expect("valid config")
        .shake(graph)
        .await
        .expect("shake")
}

/// Current source of a module's tree.
pub fn code(graph: &ModuleGraph, path: &str) -> String {
    graph
        .module(&id(path))
        .unwrap_or_else(|| panic!("{path} is not in the graph"))
        .tree()
        .source()
        .to_string()
}
