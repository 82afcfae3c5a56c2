//! Structural laws the analysis must uphold on any input: dominator-set
//! shape, frontier placement, SSA single definitions, phi minimality,
//! pipeline determinism and fixpoint convergence. Each law is checked over a
//! shared set of fixture functions covering branches, loops, nesting and
//! exception flow.

use cfssa::{
    analyze_function, Expr, FunctionDef, Pos, SsaDef, SsaFunction, Stmt, WarningDirectives,
};

fn p(line: u32) -> Pos {
    Pos::new(line, 0)
}

fn assign(target: &str, line: u32) -> Stmt {
    Stmt::Assign {
        target: target.into(),
        value: Expr::constant(p(line)),
        pos: p(line),
    }
}

fn read(name: &str, line: u32) -> Stmt {
    Stmt::Expr {
        value: Expr::name(name, p(line)),
        pos: p(line),
    }
}

/// Inputs exercising the interesting CFG shapes.
fn fixtures() -> Vec<FunctionDef> {
    vec![
        // Straight line.
        FunctionDef::new(
            "straight",
            vec![],
            vec![assign("x", 1), assign("x", 2), read("x", 3)],
        ),
        // Diamond.
        FunctionDef::new(
            "diamond",
            vec!["a".into()],
            vec![
                Stmt::If {
                    test: Expr::name("a", p(1)),
                    body: vec![assign("x", 2)],
                    orelse: vec![assign("x", 4)],
                    pos: p(1),
                },
                read("x", 5),
            ],
        ),
        // Loop with a loop-carried variable.
        FunctionDef::new(
            "looped",
            vec!["a".into()],
            vec![
                assign("x", 1),
                Stmt::While {
                    test: Expr::name("a", p(2)),
                    body: vec![
                        read("x", 3),
                        Stmt::Assign {
                            target: "x".into(),
                            value: Expr::bin(
                                Expr::name("x", p(4)),
                                Expr::constant(p(4)),
                                p(4),
                            ),
                            pos: p(4),
                        },
                    ],
                    orelse: vec![],
                    pos: p(2),
                },
                read("x", 5),
            ],
        ),
        // Nested loops with break and continue.
        FunctionDef::new(
            "nested",
            vec!["a".into(), "b".into()],
            vec![Stmt::While {
                test: Expr::name("a", p(1)),
                body: vec![
                    Stmt::While {
                        test: Expr::name("b", p(2)),
                        body: vec![assign("x", 3), Stmt::Break { pos: p(4) }],
                        orelse: vec![],
                        pos: p(2),
                    },
                    read("x", 5),
                    Stmt::Continue { pos: p(6) },
                ],
                orelse: vec![],
                pos: p(1),
            }],
        ),
        // Exception flow.
        FunctionDef::new(
            "guarded",
            vec!["a".into()],
            vec![
                Stmt::Try {
                    body: vec![assign("x", 2), read("a", 3)],
                    handler: vec![assign("x", 5)],
                    orelse: vec![],
                    finally: vec![assign("y", 7)],
                    pos: p(1),
                },
                read("x", 8),
                read("y", 9),
            ],
        ),
        // Iteration.
        FunctionDef::new(
            "iterated",
            vec!["it".into()],
            vec![
                Stmt::For {
                    target: "i".into(),
                    iter: Expr::name("it", p(1)),
                    body: vec![read("i", 2), assign("last", 3)],
                    orelse: vec![],
                    pos: p(1),
                },
                read("last", 4),
            ],
        ),
    ]
}

fn analyze(func: &FunctionDef) -> SsaFunction {
    analyze_function(func, WarningDirectives::default())
        .unwrap_or_else(|e| panic!("{} failed: {e}", func.name))
}

#[test]
fn every_block_dominates_itself_and_sets_nest() {
    for func in fixtures() {
        let out = analyze(&func);
        let g = &out.graph;
        let root = g.blocks[0];
        assert_eq!(
            g.block(root).dominators.len(),
            1,
            "{}: root dominator set",
            func.name
        );
        assert!(g.block(root).dominators.contains(&root));
        for &b in &g.blocks {
            assert!(
                g.block(b).dominators.contains(&b),
                "{}: block must dominate itself",
                func.name
            );
            if b == root {
                continue;
            }
            let idom = g.block(b).idom.expect("non-root block without idom");
            // dom(b) ⊆ dom(idom(b)) ∪ {b}
            for &d in &g.block(b).dominators {
                assert!(
                    d == b || g.block(idom).dominators.contains(&d),
                    "{}: dominator sets do not nest",
                    func.name
                );
            }
        }
    }
}

#[test]
fn frontier_entries_are_never_immediately_dominated() {
    for func in fixtures() {
        let out = analyze(&func);
        let g = &out.graph;
        for &x in &g.blocks {
            for &y in &g.block(x).dominance_frontier {
                assert_ne!(
                    g.block(y).idom,
                    Some(x),
                    "{}: frontier entry immediately dominated by its source",
                    func.name
                );
                // y must be reachable as a CFG successor of something x
                // dominates (x itself included).
                let feeds = g.blocks.iter().any(|&z| {
                    g.block(z).dominators.contains(&x) && g.block(z).children.contains(&y)
                });
                assert!(feeds, "{}: frontier entry has no feeding edge", func.name);
            }
        }
    }
}

#[test]
fn every_read_resolves_to_exactly_one_version() {
    for func in fixtures() {
        let out = analyze(&func);
        for (i, r) in out.defs.references.iter().enumerate() {
            if !out.defs.var(r.var).renameable {
                continue;
            }
            let ssa = r
                .ssa_var
                .unwrap_or_else(|| panic!("{}: reference {i} unresolved", func.name));
            assert_eq!(out.defs.ssa(ssa).source, r.var);
        }
    }
}

#[test]
fn no_live_phi_is_unread() {
    for func in fixtures() {
        let out = analyze(&func);
        for &b in &out.graph.blocks {
            for &phi in out.phis_in(b) {
                let ssa = out.defs.phi(phi).ssa_var.expect("live phi without output");
                assert!(
                    !out.defs.ssa(ssa).cf_references.is_empty(),
                    "{}: phi with no consumers survived pruning",
                    func.name
                );
                assert!(!out.defs.phi(phi).incoming.is_empty());
            }
        }
    }
}

#[test]
fn pipeline_is_deterministic() {
    for func in fixtures() {
        let first = analyze(&func);
        let second = analyze(&func);

        let shape = |out: &SsaFunction| -> Vec<(usize, Vec<usize>, usize)> {
            out.graph
                .blocks
                .iter()
                .map(|&b| {
                    let block = out.graph.block(b);
                    let children: Vec<usize> =
                        block.children.iter().map(|c| c.index()).collect();
                    (block.seq, children, block.phis.len())
                })
                .collect()
        };
        assert_eq!(shape(&first), shape(&second), "{}", func.name);
        assert_eq!(
            first.defs.ssa_vars.len(),
            second.defs.ssa_vars.len(),
            "{}",
            func.name
        );
    }
}

#[test]
fn reaching_fixpoint_is_bounded_by_the_block_count() {
    for func in fixtures() {
        let out = analyze(&func);
        let bound = out.graph.blocks.len() + 1;
        assert!(
            out.reaching_sweeps <= bound,
            "{}: {} sweeps over {} blocks",
            func.name,
            out.reaching_sweeps,
            out.graph.blocks.len()
        );
    }
}

#[test]
fn phi_chains_keep_single_definitions_through_loops() {
    // Two nested merge layers: the outer read must see one version defined
    // by a phi whose inputs are themselves uniquely defined.
    let func = FunctionDef::new(
        "chained",
        vec!["a".into(), "b".into()],
        vec![
            assign("x", 1),
            Stmt::While {
                test: Expr::name("a", p(2)),
                body: vec![Stmt::If {
                    test: Expr::name("b", p(3)),
                    body: vec![assign("x", 4)],
                    orelse: vec![],
                    pos: p(3),
                }],
                orelse: vec![],
                pos: p(2),
            },
            read("x", 5),
        ],
    );
    let out = analyze(&func);

    let x = out.var_by_name("x").unwrap();
    let r = out.defs.var(x).cf_references[0];
    let ssa = out.defs.reference(r).ssa_var.unwrap();
    let phi = match out.defs.ssa(ssa).def {
        SsaDef::Phi(phi) => phi,
        other => panic!("expected phi, got {other:?}"),
    };
    for &inc in &out.defs.phi(phi).incoming {
        // Each input has exactly one defining point and is not dead.
        match out.defs.ssa(inc).def {
            SsaDef::Phi(p2) => assert!(!out.defs.phi(p2).dead),
            SsaDef::Assignment(_) | SsaDef::Initial => {}
        }
    }
}
