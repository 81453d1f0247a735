//! End-to-end tree shaking over small module graphs.

mod helpers;

use helpers::{code, graph, id, shake, shake_with};

use fob_shake::TreeShakeConfig;

#[tokio::test]
async fn unused_export_and_dead_module_are_removed() {
    let mut graph = graph(&[
        ("/app/main.js", "import { used } from './lib';\nused();"),
        (
            "/app/lib.js",
            "import { helper } from './dead';\n\
             export function used() {}\n\
             export { helper as unused };",
        ),
        ("/app/dead.js", "export function helper() {}"),
    ]);

    let report = shake(&mut graph).await;

    let lib = code(&graph, "/app/lib.js");
    assert!(lib.contains("function used"));
    assert!(!lib.contains("unused"));
    assert!(!lib.contains("./dead"));

    assert!(!graph.contains(&id("/app/dead.js")));
    assert_eq!(report.removed, vec![id("/app/dead.js")]);
    assert_eq!(report.dangling_edges_pruned, 1);
    assert!(graph.module(&id("/app/lib.js")).unwrap().dependencies().is_empty());
    assert_eq!(report.modules_before, 3);
    assert_eq!(report.modules_after, 2);
}

#[tokio::test]
async fn export_star_forwards_only_the_imported_name() {
    let mut graph = graph(&[
        ("/app/main.js", "import { x } from './barrel';\nconsole.log(x);"),
        ("/app/barrel.js", "export * from './impl';"),
        ("/app/impl.js", "export const x = 1;\nexport const y = 2;"),
    ]);

    shake(&mut graph).await;

    let target = graph.module(&id("/app/impl.js")).unwrap();
    assert_eq!(target.exports().references("x"), 1);
    assert_eq!(target.exports().references("y"), 0);

    let impl_code = code(&graph, "/app/impl.js");
    assert!(impl_code.contains("x = 1"));
    assert!(!impl_code.contains("y = 2"));
    assert!(code(&graph, "/app/barrel.js").contains("export * from"));
}

#[tokio::test]
async fn side_effect_cycles_are_removed_once() {
    let a = ("/app/a.js", "import './b';\nexport const a = 1;");
    let b = ("/app/b.js", "import './a';\nexport const b = 2;");
    let main = ("/app/main.js", "console.log('main');");

    for modules in [[main, a, b], [main, b, a]] {
        let mut graph = graph(&modules);
        let report = shake(&mut graph).await;

        assert_eq!(graph.len(), 1);
        assert_eq!(report.removed.len(), 2);
        assert!(report.removed.contains(&id("/app/a.js")));
        assert!(report.removed.contains(&id("/app/b.js")));
    }
}

#[tokio::test]
async fn self_references_do_not_keep_a_function_alive() {
    let mut graph = graph(&[
        ("/app/main.js", "import { g } from './lib';\ng();"),
        (
            "/app/lib.js",
            "function f(n) { return n ? f(n - 1) : 0; }\nexport { f };\nexport function g() {}",
        ),
    ]);

    shake(&mut graph).await;

    let lib = code(&graph, "/app/lib.js");
    assert!(!lib.contains("function f"));
    assert!(lib.contains("function g"));
}

#[tokio::test]
async fn functions_used_by_live_exports_are_kept() {
    let mut graph = graph(&[
        ("/app/main.js", "import { g } from './lib';\ng();"),
        (
            "/app/lib.js",
            "function f() {}\nexport { f };\nexport function g() { return f(); }",
        ),
    ]);

    shake(&mut graph).await;

    let lib = code(&graph, "/app/lib.js");
    assert!(lib.contains("function f"));
    assert!(!lib.contains("export { f"));
    assert!(lib.contains("function g"));
}

#[tokio::test]
async fn unused_default_forward_drops_its_edge() {
    let mut graph = graph(&[
        ("/app/main.js", "import { other } from './barrel';\nother;"),
        (
            "/app/barrel.js",
            "export { default } from './widget';\nexport const other = 1;",
        ),
        ("/app/widget.js", "export default function Widget() {}"),
    ]);

    let report = shake(&mut graph).await;

    assert!(!code(&graph, "/app/barrel.js").contains("default"));
    assert_eq!(report.dropped_edges, 1);
    assert!(!graph.contains(&id("/app/widget.js")));
    assert_eq!(report.dangling_edges_pruned, 0);
}

#[tokio::test]
async fn renamed_default_forward_stays_while_imported() {
    let mut graph = graph(&[
        ("/app/main.js", "import { Widget } from './barrel';\nWidget();"),
        ("/app/barrel.js", "export { default as Widget } from './widget';"),
        ("/app/widget.js", "export default function Widget() {}"),
    ]);

    shake(&mut graph).await;

    assert!(code(&graph, "/app/barrel.js").contains("default as Widget"));
    assert!(code(&graph, "/app/widget.js").contains("export default"));
}

#[tokio::test]
async fn namespace_dynamic_and_require_uses_keep_every_export() {
    let mut graph = graph(&[
        (
            "/app/main.js",
            "import * as ns from './ns';\n\
             const legacy = require('./legacy');\n\
             console.log(ns, legacy);\n\
             import('./lazy');",
        ),
        ("/app/ns.js", "export const a = 1;\nexport const b = 2;"),
        ("/app/legacy.js", "export const c = 3;"),
        ("/app/lazy.js", "export const d = 4;\nexport default 5;"),
    ]);

    let report = shake(&mut graph).await;

    assert_eq!(report.modules_after, 4);
    assert!(code(&graph, "/app/ns.js").contains("b = 2"));
    assert!(code(&graph, "/app/legacy.js").contains("c = 3"));
    assert!(code(&graph, "/app/lazy.js").contains("d = 4"));
    // Namespace use does not reference the default export.
    assert!(!code(&graph, "/app/lazy.js").contains("export default"));
}

#[tokio::test]
async fn configured_ignore_patterns_protect_modules() {
    let modules = [
        ("/app/main.js", "console.log('main');"),
        ("/app/vendor/polyfill.js", "export const unused = 1;"),
        ("/app/node_modules/react-native/index.js", "export const View = 1;"),
    ];

    let mut graph = graph(&modules);
    let config = TreeShakeConfig {
        ignore: vec!["/vendor/".to_string(), "react-native/".to_string()],
        ..TreeShakeConfig::default()
    };
    let report = shake_with(&mut graph, config).await;

    assert!(report.removed.is_empty());
    assert!(report.edited.is_empty());
    assert!(code(&graph, "/app/vendor/polyfill.js").contains("unused"));
}

#[tokio::test]
async fn edited_modules_get_regenerated_output() {
    let mut graph = graph(&[
        ("/app/main.js", "import { a } from './lib';\na;"),
        ("/app/lib.js", "export const a = 1;\nexport const b = 2;"),
    ]);
    let config = TreeShakeConfig {
        source_maps: true,
        ..TreeShakeConfig::default()
    };

    let report = shake_with(&mut graph, config).await;

    assert_eq!(report.edited, vec![id("/app/lib.js")]);
    let lib = graph.module(&id("/app/lib.js")).unwrap();
    let output = lib.output.as_ref().expect("regenerated output");
    assert!(output.code.contains("a = 1"));
    assert!(!output.code.contains("b = 2"));
    assert_eq!(output.line_count, 1);
    assert!(output.map.is_some());
    assert!(graph.module(&id("/app/main.js")).unwrap().output.is_none());
}

#[tokio::test]
async fn a_second_run_removes_no_modules() {
    let mut graph = graph(&[
        ("/app/main.js", "import { used } from './lib';\nused();"),
        ("/app/lib.js", "export function used() {}\nexport function unused() {}"),
        ("/app/orphan.js", "export const orphan = 1;"),
    ]);

    let first = shake(&mut graph).await;
    assert_eq!(first.removed, vec![id("/app/orphan.js")]);

    let second = shake(&mut graph).await;
    assert!(second.removed.is_empty());
    assert!(second.edited.is_empty());
    assert_eq!(second.modules_after, 2);
}

#[tokio::test]
async fn export_star_chains_keep_the_provider() {
    let mut graph = graph(&[
        ("/app/main.js", "import { x } from './a';\nconsole.log(x);"),
        ("/app/a.js", "export * from './b';"),
        ("/app/b.js", "export * from './c';"),
        ("/app/c.js", "export const x = 1;\nexport const y = 2;"),
    ]);

    let report = shake(&mut graph).await;

    assert!(report.removed.is_empty());
    assert_eq!(report.modules_after, 4);
    assert!(code(&graph, "/app/a.js").contains("./b"));
    assert!(code(&graph, "/app/b.js").contains("./c"));
    let c = code(&graph, "/app/c.js");
    assert!(c.contains("x = 1"));
    assert!(!c.contains("y = 2"));
}

#[tokio::test]
async fn namespace_and_dynamic_use_through_a_barrel_keep_its_providers() {
    let mut graph = graph(&[
        (
            "/app/main.js",
            "import * as ns from './barrel';\n\
             console.log(ns.x);\n\
             import('./lazy');",
        ),
        ("/app/barrel.js", "export * from './impl';"),
        ("/app/impl.js", "export const x = 1;\nexport const y = 2;"),
        ("/app/lazy.js", "export * from './deep';"),
        ("/app/deep.js", "export const z = 3;"),
    ]);

    let report = shake(&mut graph).await;

    assert!(report.removed.is_empty());
    assert!(code(&graph, "/app/barrel.js").contains("./impl"));
    let provider = code(&graph, "/app/impl.js");
    assert!(provider.contains("x = 1"));
    assert!(provider.contains("y = 2"));
    assert!(code(&graph, "/app/lazy.js").contains("./deep"));
    assert!(code(&graph, "/app/deep.js").contains("z = 3"));
}
