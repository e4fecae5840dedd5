use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tsgraph::builder::{Edge, GraphBuilder, NodeBuilder};
use tsgraph::context::BackTestExecutionContext;
use tsgraph::engine::{GraphEngine, RunMode};
use tsgraph::ids::GraphId;
use tsgraph::node::{NodeBehavior, NodeContext};
use tsgraph::time::EngineTime;
use tsgraph::typemeta::TypeMeta;
use tsgraph::value::{InputHandle, OutputHandle, ScalarInput, ScalarOutput, TsInput, TsOutput};

#[derive(Debug)]
struct Ticker(i64);
impl NodeBehavior for Ticker {
    fn eval(&mut self, ctx: &mut NodeContext) -> anyhow::Result<bool> {
        self.0 += 1;
        ctx.output_root()
            .unwrap()
            .borrow_mut()
            .as_any_mut()
            .downcast_mut::<ScalarOutput<i64>>()
            .unwrap()
            .apply_result(self.0, ctx.now());
        ctx.schedule_in(EngineTime::MIN_TD);
        Ok(true)
    }
}

#[derive(Debug)]
struct PassThrough;
impl NodeBehavior for PassThrough {
    fn eval(&mut self, ctx: &mut NodeContext) -> anyhow::Result<bool> {
        let value = ctx
            .input_root()
            .unwrap()
            .borrow()
            .as_any()
            .downcast_ref::<ScalarInput<i64>>()
            .unwrap()
            .value()
            .copied();
        match value {
            Some(v) => {
                ctx.output_root()
                    .unwrap()
                    .borrow_mut()
                    .as_any_mut()
                    .downcast_mut::<ScalarOutput<i64>>()
                    .unwrap()
                    .apply_result(v, ctx.now());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn ticker_builder() -> NodeBuilder {
    NodeBuilder::new(
        "ticker",
        None,
        Some(TypeMeta::scalar_of::<i64>()),
        false,
        false,
        || {
            let out: OutputHandle = Rc::new(RefCell::new(ScalarOutput::<i64>::new()));
            (None, Some(out), None)
        },
        || Box::new(Ticker(0)),
    )
}

fn pass_through_builder() -> NodeBuilder {
    NodeBuilder::new(
        "pass_through",
        Some(TypeMeta::scalar_of::<i64>()),
        Some(TypeMeta::scalar_of::<i64>()),
        false,
        false,
        || {
            let input: InputHandle = Rc::new(RefCell::new(ScalarInput::<i64>::new(true)));
            let out: OutputHandle = Rc::new(RefCell::new(ScalarOutput::<i64>::new()));
            (Some(input), Some(out), None)
        },
        || Box::new(PassThrough),
    )
}

/// One ticker feeding `width` independent chains of `depth` pass-through
/// nodes each, all wired off the same source so every tick walks the
/// whole fan-out.
fn chain_graph(width: usize, depth: usize) -> GraphBuilder {
    let mut builders = vec![ticker_builder()];
    let mut edges = Vec::new();

    for _ in 0..width {
        let mut prev = 0;
        for _ in 0..depth {
            let index = builders.len();
            builders.push(pass_through_builder());
            edges.push(Edge::direct(prev, index));
            prev = index;
        }
    }

    edges.sort();
    GraphBuilder::new(builders, edges).expect("chain graph wiring is valid")
}

fn run_chain(width: usize, depth: usize, ticks: u64) {
    let builder = chain_graph(width, depth);
    let graph = builder.make_instance(GraphId::root()).unwrap();
    let mut engine = GraphEngine::new(graph, BackTestExecutionContext::new(EngineTime::MIN_DT), RunMode::BackTest);
    engine.schedule(0, EngineTime::MIN_DT);
    engine.run(EngineTime::from(Duration::from_nanos(ticks))).unwrap();
}

fn bench(crit: &mut Criterion) {
    crit.bench_function("single_node", |b| {
        b.iter_batched(|| (), |_| run_chain(0, 0, 200), BatchSize::SmallInput)
    });
    crit.bench_function("10x10", |b| {
        b.iter_batched(|| (), |_| run_chain(10, 10, 200), BatchSize::SmallInput)
    });
    crit.bench_function("100x100", |b| {
        b.iter_batched(|| (), |_| run_chain(100, 100, 200), BatchSize::SmallInput)
    });
}

criterion_group!(benches, bench);
criterion_main!(benches);
