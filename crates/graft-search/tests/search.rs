//! Whole runs of the search engine against small shell programs

use graft_core::{Patch, Scenario};
use graft_eval::{Software, SoftwareConfig};
use graft_search::{Engine, SearchConfig, StopReason, StrategyRegistry};
use graft_test_utils::TargetFixture;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn engine(fixture: &TargetFixture, scenario: &Scenario) -> Engine {
    let settings = scenario.settings().unwrap();
    let config = SoftwareConfig::from_scenario(scenario, &settings).unwrap();
    let software = Software::new(config, &settings).unwrap();
    assert!(fixture.work_dir().exists());
    Engine::new(software, SearchConfig::from_scenario(scenario).unwrap())
}

fn run(engine: &mut Engine, algorithm: &str) {
    let mut strategy = StrategyRegistry::with_defaults().create(algorithm).unwrap();
    engine.run(strategy.as_mut()).unwrap();
}

/// Program whose fitness is its own line count, to be maximized
fn growing() -> (TargetFixture, Scenario) {
    let fixture = TargetFixture::new(&[("lines.txt", "x\nx\nx\n")]);
    let scenario = fixture.scenario(
        "[graft]\nseed = 3\n\n\
         [software]\ntarget_files = [\"lines.txt\"]\nfitness = [\"-output\"]\n\
         run_cmd = \"sh -c 'echo GRAFT_FITNESS: $(wc -l < lines.txt)'\"\n\n\
         [search]\npossible_edits = [\"LineInsertion\"]\nwarmup = 2\nmax_steps = 5\n\n\
         [search.ls]\ndelete_prob = 0.0\n",
    );
    (fixture, scenario)
}

#[test]
fn every_insertion_is_accepted() {
    let (fixture, scenario) = growing();
    let mut engine = engine(&fixture, &scenario);
    run(&mut engine, "FirstImprovement");

    let report = &engine.report;
    assert_eq!(report.stop, Some(StopReason::StepBudget));
    assert_eq!(report.initial_fitness, Some(vec![3.0]));
    assert_eq!(report.best_fitness, Some(vec![8.0]));
    assert_eq!(report.best_patch.as_ref().map(Patch::len), Some(5));
    assert!(report.diff.as_deref().is_some_and(|d| d.contains("+x")));
    assert_eq!(engine.stats.steps, 5);
}

#[test]
fn horizon_applies_several_mutations_per_move() {
    let (fixture, mut scenario) = growing();
    scenario.search.max_steps = Some(3);
    scenario.search.ls.horizon = 2;
    let mut engine = engine(&fixture, &scenario);
    run(&mut engine, "FirstImprovement");

    assert_eq!(engine.report.stop, Some(StopReason::StepBudget));
    assert_eq!(engine.report.best_patch.as_ref().map(Patch::len), Some(6));
    assert_eq!(engine.report.best_fitness, Some(vec![9.0]));
}

#[test]
fn interrupt_is_observed_before_the_first_step() {
    let (fixture, scenario) = growing();
    let flag = Arc::new(AtomicBool::new(false));
    let mut engine = engine(&fixture, &scenario).with_interrupt(Arc::clone(&flag));
    flag.store(true, Ordering::SeqCst);
    run(&mut engine, "RandomWalk");

    assert_eq!(engine.report.stop, Some(StopReason::Interrupted));
    assert_eq!(engine.report.best_patch, Some(Patch::new()));
    assert_eq!(engine.report.best_fitness, Some(vec![3.0]));
    assert_eq!(engine.stats.steps, 0);
}

#[test]
fn dummy_search_only_warms_up() {
    let fixture = TargetFixture::counting();
    let scenario = fixture.counting_scenario("warmup_strategy = \"median\"\n");
    let mut engine = engine(&fixture, &scenario);
    run(&mut engine, "DummySearch");

    assert_eq!(engine.report.stop, Some(StopReason::DummyEnd));
    assert_eq!(engine.report.initial_fitness, Some(vec![4.0]));
    assert!(!engine.report.has_best_edits());
    assert_eq!(engine.report.diff.as_deref(), Some(""));
}

#[test]
fn broken_program_stops_during_warmup() {
    let fixture = TargetFixture::counting();
    let mut scenario = fixture.counting_scenario("");
    scenario.software.run_cmd = Some("sh -c 'exit 3'".to_string());
    let mut engine = engine(&fixture, &scenario);
    run(&mut engine, "FirstImprovement");

    assert_eq!(
        engine.report.stop.as_ref().map(ToString::to_string).as_deref(),
        Some("failed to run target software")
    );
    assert_eq!(engine.report.initial_fitness, None);
    assert_eq!(engine.stats.steps, 0);
}

#[test]
fn target_fitness_ends_the_climb() {
    let fixture = TargetFixture::counting();
    let scenario = fixture.counting_scenario("max_steps = 50\ntarget_fitness = 3.0\n\n[search.ls]\ndelete_prob = 0.0\n");
    let mut engine = engine(&fixture, &scenario);
    run(&mut engine, "FirstImprovement");

    assert_eq!(engine.report.stop, Some(StopReason::TargetFitness));
    assert_eq!(engine.report.best_fitness, Some(vec![3.0]));
    assert!(engine.stats.steps < 50);
}

#[test]
fn identical_diffs_are_evaluated_once() {
    let fixture = TargetFixture::counting();
    let scenario = fixture.counting_scenario("");
    let mut engine = engine(&fixture, &scenario);
    run(&mut engine, "DummySearch");
    let budget = engine.stats.budget;

    let once: Patch = "LineDeletion(('count.sh', 'line', 2))".parse().unwrap();
    let twice: Patch = "LineDeletion(('count.sh', 'line', 2)) | LineDeletion(('count.sh', 'line', 2))"
        .parse()
        .unwrap();
    let (_, a) = engine.evaluate_patch(&once, false).unwrap();
    let (_, b) = engine.evaluate_patch(&twice, false).unwrap();
    assert_eq!(a.fitness, Some(vec![3.0]));
    assert_eq!(b.fitness, a.fitness);
    assert!(b.cached);
    assert_eq!(engine.stats.budget, budget + 1);
}

#[test]
fn minify_drops_redundant_edits() {
    let fixture = TargetFixture::counting();
    let scenario = fixture.counting_scenario("");
    let mut engine = engine(&fixture, &scenario);
    engine.report.debug_patch = Some(
        "LineDeletion(('count.sh', 'line', 1)) | LineDeletion(('count.sh', 'line', 1)) | \
         LineDeletion(('count.sh', 'line', 2))"
            .parse()
            .unwrap(),
    );
    run(&mut engine, "ValidMinify");

    assert_eq!(engine.report.stop, Some(StopReason::ValidationEnd));
    assert_eq!(engine.report.best_fitness, Some(vec![2.0]));
    let expected: Patch = "LineDeletion(('count.sh', 'line', 1)) | LineDeletion(('count.sh', 'line', 2))"
        .parse()
        .unwrap();
    assert_eq!(engine.report.best_patch, Some(expected));
}

#[test]
fn minify_skips_rebuild_when_every_edit_is_worse() {
    let fixture = TargetFixture::new(&[(
        "count.sh",
        "x=3\nx=$((x-1))\nx=$((x-1))\necho \"GRAFT_FITNESS: $x\"\n",
    )]);
    let scenario = fixture.counting_scenario("");
    let mut engine = engine(&fixture, &scenario);
    engine.report.debug_patch = Some(
        "LineDeletion(('count.sh', 'line', 1)) | LineDeletion(('count.sh', 'line', 2))"
            .parse()
            .unwrap(),
    );
    run(&mut engine, "ValidMinify");

    assert_eq!(engine.report.initial_fitness, Some(vec![1.0]));
    assert_eq!(engine.report.stop, Some(StopReason::ValidationEndAllBad));
    // full patch gives 3, each single deletion gives 2
    assert_eq!(engine.report.best_fitness, Some(vec![2.0]));
    assert_eq!(engine.report.best_patch.as_ref().map(Patch::len), Some(1));
}

#[test]
fn validation_requires_a_patch() {
    let fixture = TargetFixture::counting();
    let scenario = fixture.counting_scenario("");
    let mut engine = engine(&fixture, &scenario);
    let mut strategy = StrategyRegistry::with_defaults().create("ValidTest").unwrap();
    assert!(engine.run(strategy.as_mut()).is_err());
}

#[test]
fn ablation_of_an_empty_patch() {
    let fixture = TargetFixture::counting();
    let scenario = fixture.counting_scenario("");
    let mut engine = engine(&fixture, &scenario);
    engine.report.debug_patch = Some(Patch::new());
    run(&mut engine, "AblationAnalysis");
    assert_eq!(engine.report.stop, Some(StopReason::AblationEndEmpty));
}

#[test]
fn ablation_ranks_every_edit() {
    let fixture = TargetFixture::counting();
    let scenario = fixture.counting_scenario("");
    let mut engine = engine(&fixture, &scenario);
    engine.report.debug_patch = Some(
        "LineDeletion(('count.sh', 'line', 1)) | LineDeletion(('count.sh', 'line', 3))"
            .parse()
            .unwrap(),
    );
    run(&mut engine, "AblationAnalysis");

    assert_eq!(engine.report.stop, Some(StopReason::AblationEnd));
    assert_eq!(engine.report.best_fitness, Some(vec![2.0]));
    assert_eq!(engine.report.best_patch.as_ref().map(Patch::len), Some(2));
}

#[test]
fn genetic_programming_tracks_generations() {
    let fixture = TargetFixture::counting();
    let scenario = fixture.counting_scenario("max_steps = 12\n\n[search.gp]\npop_size = 4\n");
    let mut engine = engine(&fixture, &scenario);
    run(&mut engine, "GeneticProgramming2Point");

    assert_eq!(engine.report.stop, Some(StopReason::StepBudget));
    assert!(engine.stats.generation.is_some_and(|g| g >= 2));
    assert!(engine.report.best_fitness.as_ref().is_some_and(|f| f[0] <= 4.0));
    assert_eq!(engine.log_counter().split('-').count(), 2);
}

#[test]
fn neighbourhood_searches_respect_the_step_budget() {
    for algorithm in ["BestImprovement", "WorstImprovement", "TabuSearch"] {
        let fixture = TargetFixture::counting();
        let scenario = fixture.counting_scenario("max_steps = 6\n\n[search.ls]\nmax_neighbours = 2\n");
        let mut engine = engine(&fixture, &scenario);
        run(&mut engine, algorithm);

        assert_eq!(engine.report.stop, Some(StopReason::StepBudget), "{algorithm}");
        assert!(engine.report.best_fitness.as_ref().is_some_and(|f| f[0] <= 4.0), "{algorithm}");
    }
}

#[test]
fn trapped_search_stops_when_asked() {
    let fixture = TargetFixture::counting();
    let scenario = fixture.counting_scenario("max_steps = 100\n\n[search.ls]\ndelete_prob = 1.0\n");
    let mut engine = engine(&fixture, &scenario);
    run(&mut engine, "RandomWalk");
    // nothing to delete from the empty patch
    assert_eq!(engine.report.stop, Some(StopReason::Trapped));
}
