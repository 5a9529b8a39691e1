//! Colony Task Headless Harness
//!
//! Runs the task contracts end to end against the ECS settlement.
//! Runs entirely in-process: no rendering, no save files on disk.
//!
//! Usage:
//!   cargo run -p colony-simtest
//!   cargo run -p colony-simtest -- --verbose

use std::collections::HashMap;

use colony_sim::facilities::AIRLOCK_CAPACITY;
use colony_sim::generation::{generate_outpost, OutpostConfig};
use colony_sim::prelude::*;
use colony_tasks::claim::ClaimWindow;
use colony_tasks::eva::WALK_BACK_INSIDE;
use colony_tasks::task::TaskDuration;
use colony_tasks::tasks::analyze_map::AnalyzeMap;
use colony_tasks::tasks::converse::{Converse, PartnerTier};
use colony_tasks::tasks::dig_regolith::COLLECT_REGOLITH;
use colony_tasks::world::{
    AirlockId, Position, ResourceKind, SettlementId, StructureId, WorkerId, WorkerLocation,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ── Task configuration (same JSON the settlement ships with) ────────────
const TASK_CONFIG_JSON: &str = include_str!("../../../data/task_config.json");

const HOME: SettlementId = SettlementId(1);

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn record(results: &mut Vec<TestResult>, name: &str, passed: bool, detail: impl Into<String>) {
    results.push(TestResult {
        name: name.into(),
        passed,
        detail: detail.into(),
    });
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    println!("=== Colony Task Harness ===\n");

    let mut results = Vec::new();

    // 1. Configuration document
    results.extend(validate_task_config(verbose));

    // 2. Contract scenarios A-E
    results.extend(validate_scenarios(verbose));

    // 3. EVA round trips and airlock contention
    results.extend(validate_eva(verbose));

    // 4. Compute admission under contention
    results.extend(validate_compute(verbose));

    // 5. Conversation partner cascade
    results.extend(validate_conversation(verbose));

    // 6. Save and resume
    results.extend(validate_persistence(verbose));

    // 7. Mixed workload sweep
    results.extend(validate_outpost_sweep(verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── Shared setup ────────────────────────────────────────────────────────

fn shipped_config() -> TaskConfig {
    TaskConfig::from_json(TASK_CONFIG_JSON).unwrap_or_default()
}

/// One habitat at the origin and one airlock 10 m east, at mid-morning.
fn outpost(config: TaskConfig) -> (ColonySim, StructureId, AirlockId) {
    let mut sim = ColonySim::new(config, 2024);
    sim.surface.msol = 400;
    let hab = sim.facilities.add_structure(Structure::new("Lander Hab", HOME));
    let lock = sim
        .facilities
        .add_airlock(Airlock::new("West Lock", HOME, Position::new(10.0, 0.0)));
    (sim, hab, lock)
}

fn at_home(hab: StructureId) -> Whereabouts {
    Whereabouts::inside(HOME, hab, Position::default())
}

/// Tick until `done` holds or `max` ticks pass. Returns whether it held.
fn run_until(sim: &mut ColonySim, max: u32, mut done: impl FnMut(&ColonySim) -> bool) -> bool {
    for _ in 0..max {
        if done(sim) {
            return true;
        }
        sim.tick();
    }
    done(sim)
}

fn phase_of(sim: &ColonySim, worker: WorkerId) -> Option<String> {
    sim.current_task(worker).and_then(|t| t.phase)
}

fn location_of(sim: &ColonySim, worker: WorkerId) -> Option<WorkerLocation> {
    sim.component::<Whereabouts>(worker).map(|w| w.location)
}

fn computing_needed(sim: &ColonySim, worker: WorkerId) -> Option<f64> {
    let snapshot = sim.task_snapshot(worker)?;
    let analysis: AnalyzeMap = serde_json::from_str(&snapshot.behavior).ok()?;
    Some(analysis.computing_needed())
}

// ── 1. Task Config ──────────────────────────────────────────────────────

fn validate_task_config(verbose: bool) -> Vec<TestResult> {
    println!("--- Task Config ---");
    let mut results = Vec::new();

    let config = match TaskConfig::from_json(TASK_CONFIG_JSON) {
        Ok(c) => c,
        Err(e) => {
            record(&mut results, "config_parse", false, format!("{}", e));
            return results;
        }
    };
    record(&mut results, "config_parse", true, "data/task_config.json parses and validates");

    // serde ignores unknown fields, so a typo would silently fall back to a default.
    let document: serde_json::Value = serde_json::from_str(TASK_CONFIG_JSON).unwrap_or_default();
    let known = serde_json::to_value(TaskConfig::default()).unwrap_or_default();
    let mut unknown = Vec::new();
    if let (Some(doc), Some(known)) = (document.as_object(), known.as_object()) {
        for (section, fields) in doc {
            let Some(known_fields) = known.get(section).and_then(|v| v.as_object()) else {
                unknown.push(section.clone());
                continue;
            };
            for key in fields.as_object().into_iter().flat_map(|f| f.keys()) {
                if !known_fields.contains_key(key) {
                    unknown.push(format!("{}.{}", section, key));
                }
            }
        }
    }
    record(
        &mut results,
        "config_known_keys",
        unknown.is_empty(),
        if unknown.is_empty() {
            "every key is a real setting".to_string()
        } else {
            format!("unknown keys: {}", unknown.join(", "))
        },
    );

    record(
        &mut results,
        "config_airlock_patience",
        config.eva.airlock_patience > 0,
        format!("airlock patience {} denials", config.eva.airlock_patience),
    );

    if verbose {
        println!(
            "  eva: cycle {} msol, walk {} m/msol; compute jitter {}..={}",
            config.eva.airlock_cycle_time,
            config.eva.walk_speed,
            config.compute.jitter_min,
            config.compute.jitter_max
        );
    }

    results
}

// ── 2. Scenarios ────────────────────────────────────────────────────────

fn validate_scenarios(verbose: bool) -> Vec<TestResult> {
    println!("--- Scenarios ---");
    let mut results = Vec::new();

    // A: no maintenance parts, the task ends before its first step.
    {
        let (mut sim, hab, _) = outpost(shipped_config());
        if let Some(s) = sim.facilities.structure_mut(hab) {
            s.wear = 0.5;
            s.parts = 0;
        }
        let ada = sim.spawn_colonist("Ada", at_home(hab));
        let assigned = sim.assign(ada, TaskOrder::MaintainStructure(hab)).is_ok();
        let finished = sim.last_finished(ada);
        let reserved = sim
            .facilities
            .structure(hab)
            .is_some_and(|s| s.reserved_for_maintenance);
        record(
            &mut results,
            "scenario_a_no_parts",
            assigned && !sim.is_busy(ada) && finished.as_ref().is_some_and(|f| f.elapsed == 0.0) && !reserved,
            format!("finished {:?}, reserved {}", finished, reserved),
        );
    }

    // B: steady-state compute request, 5.0 needed at seed 0.5.
    {
        let mut config = shipped_config();
        config.compute.jitter_min = 1.0;
        config.compute.jitter_max = 1.0;
        let (mut sim, hab, _) = outpost(config);
        sim.facilities
            .add_node(ComputeNode::new("Server Farm", HOME, 10.0));
        let ada = sim.spawn_colonist("Ada", at_home(hab));
        let _ = sim.assign(
            ada,
            TaskOrder::AnalyzeMap {
                computing_needed: 5.0,
                seed: 0.5,
                window: 1.0,
                duration: TaskDuration::Unbounded,
            },
        );
        sim.tick();
        let left = computing_needed(&sim, ada);
        record(
            &mut results,
            "scenario_b_steady_state",
            left.is_some_and(|l| (l - 4.5).abs() < 1e-9) && sim.is_busy(ada),
            format!("computing needed {:?}", left),
        );
    }

    // C: final request, 0.3 needed at seed 0.5.
    {
        let mut config = shipped_config();
        config.compute.jitter_min = 1.0;
        config.compute.jitter_max = 1.0;
        let (mut sim, hab, _) = outpost(config);
        sim.facilities
            .add_node(ComputeNode::new("Server Farm", HOME, 10.0));
        let ada = sim.spawn_colonist("Ada", at_home(hab));
        let _ = sim.assign(
            ada,
            TaskOrder::AnalyzeMap {
                computing_needed: 0.3,
                seed: 0.5,
                window: 1.0,
                duration: TaskDuration::Unbounded,
            },
        );
        sim.tick();
        let left = computing_needed(&sim, ada);
        let active_after_grant = sim.is_busy(ada);
        sim.tick();
        record(
            &mut results,
            "scenario_c_final_request",
            left == Some(0.0) && active_after_grant && !sim.is_busy(ada),
            format!("computing needed {:?}, ended on the next check", left),
        );
    }

    // D: a hazard mid-site-work turns the worker around in the same step.
    {
        let (mut sim, hab, _) = outpost(shipped_config());
        let ada = sim.spawn_colonist("Ada", at_home(hab));
        let _ = sim.assign(
            ada,
            TaskOrder::DigRegolith {
                site: Position::new(60.0, 0.0),
            },
        );
        let digging = run_until(&mut sim, 100, |s| {
            phase_of(s, ada).as_deref() == Some(COLLECT_REGOLITH.name())
        });
        sim.surface.start_radiation_event(50);
        sim.tick();
        let phase = phase_of(&sim, ada);
        record(
            &mut results,
            "scenario_d_same_step_return",
            digging && phase.as_deref() == Some(WALK_BACK_INSIDE.name()),
            format!("phase after the hazard tick: {:?}", phase),
        );
        if verbose {
            println!("  hazard raised at msol {}, {:?}", sim.msol(), sim.current_task(ada));
        }
    }

    // E: ending twice does not release a reservation someone else now holds.
    {
        let (mut sim, hab, _) = outpost(shipped_config());
        if let Some(s) = sim.facilities.structure_mut(hab) {
            s.wear = 0.5;
            s.parts = 2;
        }
        let ada = sim.spawn_colonist("Ada", at_home(hab));
        let grace = sim.spawn_colonist("Grace", at_home(hab));
        let _ = sim.assign(ada, TaskOrder::MaintainStructure(hab));
        let first = sim.cancel(ada).unwrap_or(false);
        let _ = sim.assign(grace, TaskOrder::MaintainStructure(hab));
        let second = sim.cancel(ada).unwrap_or(true);
        let still_reserved = sim
            .facilities
            .structure(hab)
            .is_some_and(|s| s.reserved_for_maintenance);
        record(
            &mut results,
            "scenario_e_idempotent_end",
            first && !second && still_reserved && sim.is_busy(grace),
            format!("first end {}, second end {}, reserved {}", first, second, still_reserved),
        );
    }

    results
}

// ── 3. EVA ──────────────────────────────────────────────────────────────

fn validate_eva(verbose: bool) -> Vec<TestResult> {
    println!("--- EVA ---");
    let mut results = Vec::new();

    // Single round trip.
    {
        let (mut sim, hab, lock) = outpost(shipped_config());
        let ada = sim.spawn_colonist("Ada", at_home(hab));
        if let Some(mut cargo) = sim.component_mut::<Cargo>(ada) {
            cargo.limit = 5.0;
        }
        let _ = sim.assign(
            ada,
            TaskOrder::DigRegolith {
                site: Position::new(30.0, 0.0),
            },
        );
        let back = run_until(&mut sim, 200, |s| !s.is_busy(ada));
        let stock = sim.facilities.stock(ResourceKind::Regolith);
        let empty = sim.facilities.airlock(lock).is_some_and(|a| a.occupants.is_empty());
        record(
            &mut results,
            "eva_round_trip",
            back && location_of(&sim, ada) == Some(WorkerLocation::Inside) && (stock - 5.0).abs() < 1e-9 && empty,
            format!("back inside at msol {}, {:.1} kg in stock", sim.msol(), stock),
        );
    }

    // More diggers than airlock slots.
    {
        let (mut sim, hab, lock) = outpost(shipped_config());
        let crew: Vec<WorkerId> = (0..6)
            .map(|i| sim.spawn_colonist(format!("Digger {}", i), at_home(hab)))
            .collect();
        for (i, id) in crew.iter().enumerate() {
            if let Some(mut cargo) = sim.component_mut::<Cargo>(*id) {
                cargo.limit = 3.0;
            }
            let site = Position::new(25.0, 5.0 * i as f64);
            let _ = sim.assign(*id, TaskOrder::DigRegolith { site });
        }
        let mut peak = 0;
        let all_done = run_until(&mut sim, 400, |s| {
            let occupied = s.facilities.airlock(lock).map_or(0, |a| a.occupants.len());
            peak = peak.max(occupied);
            crew.iter().all(|id| !s.is_busy(*id))
        });
        let all_inside = crew
            .iter()
            .all(|id| location_of(&sim, *id) == Some(WorkerLocation::Inside));
        record(
            &mut results,
            "eva_airlock_capacity",
            peak <= AIRLOCK_CAPACITY,
            format!("peak occupancy {} of {}", peak, AIRLOCK_CAPACITY),
        );
        record(
            &mut results,
            "eva_crowd_returns",
            all_done && all_inside,
            format!(
                "{} diggers back, {:.1} kg in stock",
                crew.len(),
                sim.facilities.stock(ResourceKind::Regolith)
            ),
        );
        if verbose {
            for id in &crew {
                println!("  {:?}: {:?}", id, sim.last_finished(*id));
            }
        }
    }

    // No airlock, no EVA.
    {
        let mut sim = ColonySim::new(shipped_config(), 1);
        sim.surface.msol = 400;
        let hab = sim.facilities.add_structure(Structure::new("Sealed Hab", HOME));
        let ada = sim.spawn_colonist("Ada", at_home(hab));
        let _ = sim.assign(
            ada,
            TaskOrder::DigRegolith {
                site: Position::new(30.0, 0.0),
            },
        );
        record(
            &mut results,
            "eva_needs_airlock",
            !sim.is_busy(ada) && location_of(&sim, ada) == Some(WorkerLocation::Inside),
            "no airlock, the EVA never starts",
        );
    }

    // After dark the worker turns around without digging.
    {
        let (mut sim, hab, _) = outpost(shipped_config());
        sim.surface.msol = 900;
        let ada = sim.spawn_colonist("Ada", at_home(hab));
        let _ = sim.assign(
            ada,
            TaskOrder::DigRegolith {
                site: Position::new(30.0, 0.0),
            },
        );
        let back = run_until(&mut sim, 200, |s| !s.is_busy(ada));
        record(
            &mut results,
            "eva_dark_no_digging",
            back
                && location_of(&sim, ada) == Some(WorkerLocation::Inside)
                && sim.facilities.stock(ResourceKind::Regolith) == 0.0,
            format!("back inside at msol {} with nothing dug", sim.msol()),
        );
    }

    results
}

// ── 4. Compute ──────────────────────────────────────────────────────────

fn validate_compute(verbose: bool) -> Vec<TestResult> {
    println!("--- Compute ---");
    let mut results = Vec::new();

    let (mut sim, hab, _) = outpost(shipped_config());
    let node = sim
        .facilities
        .add_node(ComputeNode::new("Rover Computer", HOME, 1.2));
    let analysts: Vec<WorkerId> = (0..3)
        .map(|i| sim.spawn_colonist(format!("Analyst {}", i), at_home(hab)))
        .collect();
    for id in &analysts {
        let _ = sim.assign(
            *id,
            TaskOrder::AnalyzeMap {
                computing_needed: 2.0,
                seed: 0.5,
                window: 1.0,
                duration: TaskDuration::Bounded(100.0),
            },
        );
    }

    let mut overbooked = 0;
    let all_done = run_until(&mut sim, 200, |s| {
        if let Some(n) = s.facilities.node(node) {
            let window = ClaimWindow::new(s.msol(), s.msol() + 4);
            if window.msols().any(|m| n.ledger.used_at(m) > n.ledger.capacity() + 1e-9) {
                overbooked += 1;
            }
        }
        analysts.iter().all(|id| !s.is_busy(*id))
    });
    record(
        &mut results,
        "compute_never_overbooked",
        overbooked == 0,
        format!("{} ticks over capacity", overbooked),
    );
    record(
        &mut results,
        "compute_contention_resolves",
        all_done,
        format!("three analysts done by msol {}", sim.msol()),
    );
    if verbose {
        for id in &analysts {
            println!("  {:?}: {:?}", id, sim.last_finished(*id));
        }
    }

    // With no node at all the analyst keeps trying until the duration runs out.
    {
        let (mut sim, hab, _) = outpost(shipped_config());
        let ada = sim.spawn_colonist("Ada", at_home(hab));
        let _ = sim.assign(
            ada,
            TaskOrder::AnalyzeMap {
                computing_needed: 2.0,
                seed: 0.5,
                window: 1.0,
                duration: TaskDuration::Bounded(5.0),
            },
        );
        sim.run(3);
        let still_waiting = sim.is_busy(ada);
        let ended = run_until(&mut sim, 10, |s| !s.is_busy(ada));
        let elapsed = sim.last_finished(ada).map(|f| f.elapsed);
        record(
            &mut results,
            "compute_gives_up_at_duration",
            still_waiting && ended && elapsed.is_some_and(|e| (e - 5.0).abs() < 1e-9),
            format!("ended after {:?} msol", elapsed),
        );
    }

    // An open-ended analysis with no node stops once its patience runs out.
    {
        let config = shipped_config();
        let patience = config.compute.patience;
        let (mut sim, hab, _) = outpost(config);
        let ada = sim.spawn_colonist("Ada", at_home(hab));
        let _ = sim.assign(
            ada,
            TaskOrder::AnalyzeMap {
                computing_needed: 2.0,
                seed: 0.5,
                window: 1.0,
                duration: TaskDuration::Unbounded,
            },
        );
        let ended = run_until(&mut sim, 3 * patience, |s| !s.is_busy(ada));
        record(
            &mut results,
            "compute_gives_up_on_patience",
            ended,
            format!("patience {} refusals, ended at msol {}", patience, sim.msol()),
        );
        if verbose {
            println!("  {:?}", sim.last_finished(ada));
        }
    }

    results
}

// ── 5. Conversation ─────────────────────────────────────────────────────

fn validate_conversation(verbose: bool) -> Vec<TestResult> {
    println!("--- Conversation ---");
    let mut results = Vec::new();

    let (mut sim, hab, _) = outpost(shipped_config());
    let lab = sim.facilities.add_structure(Structure::new("Laboratory", HOME));
    let away = SettlementId(2);
    let outpost_b = sim.facilities.add_structure(Structure::new("Outpost B Hab", away));

    let ada = sim.spawn_colonist("Ada", at_home(hab));
    let grace = sim.spawn_colonist("Grace", at_home(lab));
    sim.spawn_colonist(
        "Yuri",
        Whereabouts::inside(away, outpost_b, Position::default()),
    );

    let _ = sim.assign(ada, TaskOrder::Converse);
    let partner = sim
        .task_snapshot(ada)
        .and_then(|s| serde_json::from_str::<Converse>(&s.behavior).ok())
        .and_then(|c| c.partner().zip(c.tier()));
    record(
        &mut results,
        "conversation_same_settlement_first",
        partner == Some((grace, PartnerTier::SameSettlement)),
        format!("partner {:?}", partner),
    );

    if let Some(mut condition) = sim.component_mut::<Condition>(ada) {
        condition.stress = 20.0;
    }
    let ended = run_until(&mut sim, 50, |s| !s.is_busy(ada));
    let stress = sim.component::<Condition>(ada).map(|c| c.stress);
    record(
        &mut results,
        "conversation_relieves_stress",
        ended && stress.is_some_and(|s| s < 20.0),
        format!("stress 20.0 -> {:?}", stress),
    );
    if verbose {
        println!("  {:?}", sim.last_finished(ada));
    }

    results
}

// ── 6. Persistence ──────────────────────────────────────────────────────

fn validate_persistence(verbose: bool) -> Vec<TestResult> {
    println!("--- Persistence ---");
    let mut results = Vec::new();

    let (mut sim, hab, _) = outpost(shipped_config());
    let ada = sim.spawn_colonist("Ada", at_home(hab));
    if let Some(mut cargo) = sim.component_mut::<Cargo>(ada) {
        cargo.limit = 4.0;
    }
    let _ = sim.assign(
        ada,
        TaskOrder::DigRegolith {
            site: Position::new(30.0, 0.0),
        },
    );
    let outside = run_until(&mut sim, 100, |s| location_of(s, ada) == Some(WorkerLocation::Outside));

    let mut buffer = Vec::new();
    let saved = sim.save(&mut buffer);
    let mut loaded = ColonySim::default();
    let restored = saved.is_ok() && loaded.load(&buffer[..]).is_ok();
    record(
        &mut results,
        "persistence_roundtrip",
        outside && restored && loaded.current_task(ada) == sim.current_task(ada),
        format!("{} bytes, task {:?}", buffer.len(), loaded.current_task(ada).map(|t| t.name)),
    );

    let finished = run_until(&mut loaded, 300, |s| !s.is_busy(ada));
    record(
        &mut results,
        "persistence_resumes",
        finished
            && location_of(&loaded, ada) == Some(WorkerLocation::Inside)
            && (loaded.facilities.stock(ResourceKind::Regolith) - 4.0).abs() < 1e-9,
        format!("resumed EVA finished at msol {}", loaded.msol()),
    );
    if verbose {
        println!(
            "  save taken at msol {}, suit time {:?}",
            sim.msol(),
            loaded.component::<EvaSuit>(ada).map(|s| s.eva_time)
        );
    }

    results
}

// ── 7. Outpost sweep ────────────────────────────────────────────────────

fn validate_outpost_sweep(verbose: bool) -> Vec<TestResult> {
    println!("--- Outpost Sweep ---");
    let mut results = Vec::new();

    let mut sim = ColonySim::new(shipped_config(), 77);
    sim.surface.msol = 300;
    let mut rng = StdRng::seed_from_u64(77);
    let layout = generate_outpost(&mut sim, &OutpostConfig::default(), &mut rng);
    let agents: Vec<WorkerId> = layout
        .colonists
        .iter()
        .chain(layout.robots.iter())
        .copied()
        .collect();

    let mut started: HashMap<WorkerId, u32> = HashMap::new();
    let mut time_violations = 0;
    let mut stranded_idle = 0;
    let mut airlock_overflows = 0;
    let mut finished_tasks = 0;

    for _ in 0..400 {
        for id in &agents {
            if sim.is_busy(*id) {
                continue;
            }
            if started.remove(id).is_some() {
                finished_tasks += 1;
            }
            let order = match rng.gen_range(0..4) {
                0 => TaskOrder::Maintenance,
                1 => TaskOrder::AnalyzeMap {
                    computing_needed: rng.gen_range(1.0..4.0),
                    seed: 0.5,
                    window: 1.0,
                    duration: TaskDuration::Bounded(60.0),
                },
                2 => TaskOrder::Converse,
                _ => TaskOrder::DigRegolith {
                    site: Position::new(rng.gen_range(-60.0..60.0), rng.gen_range(-60.0..60.0)),
                },
            };
            if sim.assign(*id, order).is_ok() && sim.is_busy(*id) {
                started.insert(*id, sim.msol());
            }
        }

        sim.tick();

        for id in &agents {
            match (sim.current_task(*id), started.get(id)) {
                (Some(task), Some(start)) if sim.is_busy(*id) => {
                    if task.elapsed > f64::from(sim.msol() - start) + 1e-9 {
                        time_violations += 1;
                    }
                }
                _ => {
                    if location_of(&sim, *id) != Some(WorkerLocation::Inside) {
                        stranded_idle += 1;
                    }
                }
            }
        }
        airlock_overflows += sim
            .facilities
            .airlocks
            .values()
            .filter(|a| a.occupants.len() > a.capacity)
            .count();
    }

    record(
        &mut results,
        "sweep_time_conservation",
        time_violations == 0,
        format!("{} tasks used more time than offered", time_violations),
    );
    record(
        &mut results,
        "sweep_idle_agents_inside",
        stranded_idle == 0,
        format!("{} idle agent-ticks outside", stranded_idle),
    );
    record(
        &mut results,
        "sweep_airlocks_within_capacity",
        airlock_overflows == 0,
        format!("{} airlock overflows", airlock_overflows),
    );
    record(
        &mut results,
        "sweep_work_gets_done",
        finished_tasks > 0,
        format!("{} tasks finished in 400 msol", finished_tasks),
    );

    if verbose {
        let maintained: u32 = sim.facilities.structures.values().map(|s| s.maintenance_count).sum();
        println!(
            "  {} maintenances, {:.1} kg regolith, {} agents",
            maintained,
            sim.facilities.stock(ResourceKind::Regolith),
            agents.len()
        );
    }

    results
}
