//! End-to-end index scenarios on the canonical 12-vector fixture.

use proxima::bsp::{KdCutPlaneFactory, RpCutPlaneFactory};
use proxima::graph::AknnGraphBuilder;
use proxima::index::{
    BspTreeIndexBuilder, CompositeIndexBuilder, FlatIndexBuilder, GraphIndexBuilder, MutableIndex,
};
use proxima::{search, Context, EntryPointIndex, Error, Index, IndexBuilder};

fn dataset() -> Vec<Vec<f32>> {
    vec![
        vec![-0.662, -0.405, 0.508, -0.991, -0.614, -1.639, 0.637, 0.715],
        vec![0.44, -1.795, -0.243, -1.375, 1.154, 0.142, -0.219, -0.711],
        vec![0.22, -0.029, 0.7, -0.963, 0.257, 0.419, 0.491, -0.87],
        vec![0.906, 0.551, -1.198, 1.517, 1.616, 0.014, -1.358, -1.004],
        vec![0.687, 0.818, 0.868, 0.688, 0.428, 0.582, -0.352, -0.269],
        vec![-0.621, -0.586, -0.468, 0.494, 0.485, 0.407, 1.273, -1.1],
        vec![1.606, 1.256, -0.644, -0.858, 0.743, -0.063, 0.042, -1.539],
        vec![0.255, 1.018, -0.835, -0.288, 0.992, -0.17, 0.764, -1.0],
        vec![1.061, -0.506, -1.467, 0.043, 1.121, 1.03, 0.596, -1.747],
        vec![-0.269, -0.346, -0.076, -0.392, 0.301, -1.097, 0.139, 1.692],
        vec![-1.034, -1.709, -2.693, 1.539, -1.186, 0.29, -0.935, -0.546],
        vec![1.954, -1.708, -0.423, -2.241, 1.272, -0.253, -1.013, -0.382],
    ]
}

struct Scenario {
    query: [f32; 8],
    k: usize,
    expected: Vec<u32>,
}

fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            query: [-0.621, -0.586, -0.468, 0.494, 0.485, 0.407, 1.273, -1.1],
            k: 1,
            expected: vec![5],
        },
        Scenario {
            query: [
                -0.83059702,
                -1.01070708,
                -0.15162675,
                -1.32760066,
                -1.19706362,
                -0.21952724,
                -0.27582108,
                0.93780233,
            ],
            k: 2,
            expected: vec![0, 9],
        },
        Scenario {
            query: [0.0; 8],
            k: 5,
            expected: vec![2, 4, 5, 7, 9],
        },
        Scenario {
            query: [-0.621, -0.586, -0.468, 0.494, 0.485, 0.407, 1.273, -1.1],
            k: 10,
            expected: vec![5, 7, 2, 8, 4, 1, 6, 0, 9, 3],
        },
    ]
}

fn check_scenarios<I: Index<f32>>(name: &str, index: &I) {
    let ctx = Context::new();
    for (case, scenario) in scenarios().iter().enumerate() {
        let results = index.search(&ctx, &scenario.query, scenario.k, 64);
        let indices: Vec<u32> = results.iter().map(|r| r.index).collect();
        assert_eq!(
            indices, scenario.expected,
            "{name} failed scenario {case}"
        );
    }
}

#[test]
fn flat_index_scenarios() {
    let ctx = Context::new();
    let index = FlatIndexBuilder::new(8).build(&ctx, &dataset()).unwrap();
    check_scenarios("flat", &index);
}

#[test]
fn kd_tree_index_scenarios() {
    let ctx = Context::new();
    for leafs in [1, 5] {
        let index = BspTreeIndexBuilder::new(8, KdCutPlaneFactory::new())
            .with_leafs(leafs)
            .build(&ctx, &dataset())
            .unwrap();
        check_scenarios(&format!("kd-leafs-{leafs}"), &index);
    }
}

#[test]
fn randomized_kd_tree_index_scenarios() {
    let ctx = Context::new();
    let index = BspTreeIndexBuilder::new(
        8,
        KdCutPlaneFactory::new().with_top_k_candidates(5),
    )
    .with_leafs(1)
    .with_trees(5)
    .build(&ctx, &dataset())
    .unwrap();
    check_scenarios("randomized-kd", &index);
}

#[test]
fn rp_tree_index_scenarios() {
    let ctx = Context::new();
    for leafs in [1, 5] {
        let index = BspTreeIndexBuilder::new(8, RpCutPlaneFactory::new())
            .with_leafs(leafs)
            .build(&ctx, &dataset())
            .unwrap();
        check_scenarios(&format!("rp-leafs-{leafs}"), &index);
    }
}

#[test]
fn randomized_rp_tree_index_scenarios() {
    let ctx = Context::new();
    let index = BspTreeIndexBuilder::new(8, RpCutPlaneFactory::new())
        .with_leafs(1)
        .with_trees(5)
        .build(&ctx, &dataset())
        .unwrap();
    check_scenarios("randomized-rp", &index);
}

#[test]
fn graph_index_matches_ground_truth_with_full_entry_coverage() {
    let ctx = Context::new();
    let index = GraphIndexBuilder::new(8, AknnGraphBuilder::new().with_k(5).with_rho(1.0))
        .build(&ctx, &dataset())
        .unwrap();

    for (case, scenario) in scenarios().iter().enumerate() {
        let entries: Vec<u32> = (0..12).collect();
        let results = search(
            index.search_channel_with_entries(&ctx, &scenario.query, entries),
            scenario.k,
            64,
        );
        let indices: Vec<u32> = results.iter().map(|r| r.index).collect();
        assert_eq!(indices, scenario.expected, "graph failed scenario {case}");
    }
}

#[test]
fn graph_index_default_entries_return_ordered_unique_results() {
    let ctx = Context::new();
    let index = GraphIndexBuilder::new(8, AknnGraphBuilder::new().with_k(5).with_rho(1.0))
        .build(&ctx, &dataset())
        .unwrap();

    let results = index.search(&ctx, &[0.0; 8], 5, 64);
    assert!(!results.is_empty());
    assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));

    let mut indices: Vec<u32> = results.iter().map(|r| r.index).collect();
    indices.sort_unstable();
    indices.dedup();
    assert_eq!(indices.len(), results.len());
}

#[test]
fn composite_index_scenarios() {
    let ctx = Context::new();
    let builder = CompositeIndexBuilder::new(
        BspTreeIndexBuilder::new(8, RpCutPlaneFactory::new()).with_leafs(5),
        GraphIndexBuilder::new(8, AknnGraphBuilder::new().with_k(5).with_rho(1.0)),
    )
    .with_entries_num(12);

    let index = builder.build(&ctx, &dataset()).unwrap();
    check_scenarios("composite", &index);
}

#[test]
fn rebuild_on_insert_scenarios() {
    let data = dataset();

    let flat = MutableIndex::new(FlatIndexBuilder::new(8));
    let kd = MutableIndex::new(
        BspTreeIndexBuilder::new(8, KdCutPlaneFactory::new()).with_leafs(1),
    );
    let randomized_kd = MutableIndex::new(
        BspTreeIndexBuilder::new(8, KdCutPlaneFactory::new().with_top_k_candidates(5))
            .with_leafs(1)
            .with_trees(5),
    );

    fn run<B: IndexBuilder<f32>>(name: &str, mut index: MutableIndex<f32, B>, data: &[Vec<f32>]) {
        let ctx = Context::new();
        for row in &data[..6] {
            index.add(row.clone());
        }
        index.build(&ctx).unwrap();
        assert!(index.has_index());

        for row in &data[6..] {
            index.add(row.clone());
        }

        let query = [-0.621, -0.586, -0.468, 0.494, 0.485, 0.407, 1.273, -1.1];
        let results = index.search(&ctx, &query, 1, 64).unwrap();
        assert_eq!(results[0].index, 5, "{name} failed rebuild-on-insert");
    }

    run("flat", flat, &data);
    run("kd", kd, &data);
    run("randomized-kd", randomized_kd, &data);
}

#[test]
fn empty_pool_build_behavior() {
    let ctx = Context::new();

    assert!(FlatIndexBuilder::new(8)
        .build(&ctx, &Vec::<Vec<f32>>::new())
        .is_ok());

    let kd: Result<_, Error> = BspTreeIndexBuilder::new(8, KdCutPlaneFactory::new())
        .build(&ctx, &Vec::<Vec<f32>>::new());
    assert!(matches!(kd, Err(Error::EmptyPool)));

    let graph: Result<_, Error> = GraphIndexBuilder::new(8, AknnGraphBuilder::new())
        .build(&ctx, &Vec::<Vec<f32>>::new());
    assert!(matches!(graph, Err(Error::EmptyPool)));
}

#[test]
fn invalid_feature_dim_is_rejected() {
    let ctx = Context::new();
    let mut rows = dataset();
    rows.push(vec![1.0, 2.0]);

    let result = FlatIndexBuilder::new(8).build(&ctx, &rows);
    assert!(matches!(
        result,
        Err(Error::InvalidFeatureDim { expected: 8, got: 2 })
    ));
}

#[test]
fn graph_symmetry_after_build() {
    let ctx = Context::new();
    let index = GraphIndexBuilder::new(8, AknnGraphBuilder::new().with_k(4).with_rho(1.0))
        .build(&ctx, &dataset())
        .unwrap();

    let graph = index.graph();
    for (i, node) in graph.nodes.iter().enumerate() {
        for &j in &node.neighbors {
            assert!(
                graph.nodes[j as usize].neighbors.contains(&(i as u32)),
                "edge {i} -> {j} has no reciprocal"
            );
        }
    }
}

#[test]
fn recall_never_drops_as_the_candidate_budget_grows() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(97);
    let rows: Vec<Vec<f32>> = (0..200)
        .map(|_| (0..8).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect();
    let queries: Vec<Vec<f32>> = (0..10)
        .map(|_| (0..8).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect();

    let ctx = Context::new();
    let flat = FlatIndexBuilder::new(8).build(&ctx, &rows).unwrap();
    let forest = BspTreeIndexBuilder::new(8, KdCutPlaneFactory::new().with_top_k_candidates(3))
        .with_leafs(4)
        .with_trees(3)
        .build(&ctx, &rows)
        .unwrap();

    let k = 5;
    for query in &queries {
        let truth: Vec<u32> = flat
            .search(&ctx, query, k, rows.len())
            .iter()
            .map(|r| r.index)
            .collect();

        let mut last_recall = 0usize;
        for max_candidates in [4, 8, 16, 32, 64, 128, 256, 600] {
            let got = forest.search(&ctx, query, k, max_candidates);
            let recall = got
                .iter()
                .filter(|r| truth.contains(&r.index))
                .count();
            assert!(
                recall >= last_recall,
                "recall dropped from {last_recall} to {recall} at budget {max_candidates}"
            );
            last_recall = recall;
        }
        assert_eq!(last_recall, k, "full budget must recover ground truth");
    }
}

#[test]
fn cancellation_cuts_searches_short() {
    let ctx_token = proxima::CancellationToken::new();
    let ctx = Context::new().with_cancellation(ctx_token.clone());
    let index = FlatIndexBuilder::new(8).build(&ctx, &dataset()).unwrap();

    let mut stream = index.search_channel(&ctx, &[0.0; 8]);
    assert!(stream.next().is_some());
    ctx_token.cancel();
    assert!(stream.next().is_none());
}

#[test]
fn disabled_avx2_context_gives_the_same_answers() {
    let ctx = Context::new().with_linalg(proxima::linalg::LinAlgConfig { disable_avx2: true });
    let index = FlatIndexBuilder::new(8).build(&ctx, &dataset()).unwrap();

    for scenario in scenarios() {
        let results = index.search(&ctx, &scenario.query, scenario.k, 64);
        let indices: Vec<u32> = results.iter().map(|r| r.index).collect();
        assert_eq!(indices, scenario.expected);
    }
}

#[test]
fn u8_corpus_is_supported() {
    let ctx = Context::new();
    let rows: Vec<Vec<u8>> = vec![
        vec![0, 0, 0, 0],
        vec![10, 0, 0, 0],
        vec![0, 10, 0, 0],
        vec![200, 200, 200, 200],
    ];
    let index = FlatIndexBuilder::new(4).build(&ctx, &rows).unwrap();

    let results = index.search(&ctx, &[9u8, 1, 0, 0], 2, 16);
    let indices: Vec<u32> = results.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![1, 0]);

    let tree = BspTreeIndexBuilder::new(4, KdCutPlaneFactory::new())
        .with_leafs(1)
        .build(&ctx, &rows)
        .unwrap();
    let results = tree.search(&ctx, &[9u8, 1, 0, 0], 2, 16);
    let indices: Vec<u32> = results.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![1, 0]);
}
