// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! The population controller.
//!
//! Owns the run: seeds the population, drives evaluations (generational or
//! steady-state), maintains halls of fame and statistics, honors the
//! op-tag lifecycle (`continue`/`pause`/`done`), and enforces the stop
//! conditions. A paused run keeps its state; `done` finishes the in-flight
//! generation, emits final stats, and terminates cleanly.
//!
//! The controller runs on its own thread. [`Experiment`] is the
//! run-control surface handed to the embedding application.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{info, warn};

use bardo_evolution::{construct_agent, MorphologyRegistry};
use bardo_mesh::{evaluate_agent, EvaluationOptions, MeshResult, ScapeRegistry};
use bardo_state::{ActiveAgentRegistry, EvaluationCounters, PopulationStatusCell, Store};
use bardo_structures::{
    AgentId, Constraint, EvoAlg, ExperimentConfig, OpMode, OpTag, Population, PopulationId,
    PopulationStatus, Specie, SpecieId, Trace,
};

use crate::error::{PopulationError, Result};
use crate::hof::{champion_of, update_fs, update_hof, HofOutcome};
use crate::selection::{assemble_next_generation, create_offspring, pick_steady_state_parent};
use crate::stats::{refresh_specie_fitness, specie_snapshot, MonotonicClock};

/// Crashed meshes restart with exponential backoff, at most this many
/// times within any [`RESTART_WINDOW`] span; exceeding the budget fails
/// the run.
const MAX_RESTARTS_PER_WINDOW: usize = 4;
const RESTART_WINDOW: Duration = Duration::from_secs(20);
const RESTART_BACKOFF_BASE: Duration = Duration::from_millis(50);

/// Rolling restart budget shared by every evaluation of the run.
#[derive(Default)]
struct RestartWindow {
    restarts: Mutex<Vec<Instant>>,
}

impl RestartWindow {
    /// Record one restart if the rolling window still has budget. `false`
    /// means the budget is exhausted and the caller must escalate.
    fn try_restart(&self) -> bool {
        let mut log = self.restarts.lock();
        let now = Instant::now();
        log.retain(|t| now.duration_since(*t) < RESTART_WINDOW);
        if log.len() >= MAX_RESTARTS_PER_WINDOW {
            return false;
        }
        log.push(now);
        true
    }
}

/// Everything a run needs from the embedding application.
pub struct RunContext {
    pub store: Arc<Store>,
    pub morphologies: MorphologyRegistry,
    pub scapes: ScapeRegistry,
    pub config: ExperimentConfig,
    /// One specie is seeded per constraint.
    pub constraints: Vec<Constraint>,
}

/// Final report of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub population_id: PopulationId,
    pub generations: u64,
    pub tot_evaluations: u64,
    pub best_fitness: Vec<f64>,
    pub goal_reached: bool,
    pub trace: Trace,
}

enum ControlMsg {
    SetOpTag(OpTag),
    SetGoalReached,
}

/// Run-control surface: pause/resume/stop and goal signalling for a live
/// run, plus `wait()` to collect the final report.
pub struct Experiment {
    cmd_tx: Sender<ControlMsg>,
    status: Arc<PopulationStatusCell>,
    handle: std::thread::JoinHandle<Result<RunReport>>,
}

impl Experiment {
    /// Start a new run on a dedicated controller thread.
    pub fn start(ctx: RunContext) -> Experiment {
        let (cmd_tx, cmd_rx) = unbounded();
        let status = Arc::new(PopulationStatusCell::new());
        let thread_status = status.clone();
        let handle = std::thread::spawn(move || {
            let mut controller = Controller::new(ctx, thread_status, cmd_rx);
            controller.run()
        });
        Experiment {
            cmd_tx,
            status,
            handle,
        }
    }

    pub fn pause(&self) {
        let _ = self.cmd_tx.send(ControlMsg::SetOpTag(OpTag::Pause));
    }

    pub fn resume(&self) {
        let _ = self.cmd_tx.send(ControlMsg::SetOpTag(OpTag::Continue));
    }

    /// Finish the in-flight generation, emit final stats, terminate.
    pub fn stop(&self) {
        let _ = self.cmd_tx.send(ControlMsg::SetOpTag(OpTag::Done));
    }

    /// A scape declared the task solved.
    pub fn set_goal_reached(&self) {
        let _ = self.cmd_tx.send(ControlMsg::SetGoalReached);
    }

    pub fn status(&self) -> PopulationStatus {
        self.status.get()
    }

    /// Block until the run terminates and return its report.
    pub fn wait(self) -> Result<RunReport> {
        self.handle
            .join()
            .map_err(|_| PopulationError::ControllerLost)?
    }
}

struct Controller {
    ctx: RunContext,
    status: Arc<PopulationStatusCell>,
    cmd_rx: Receiver<ControlMsg>,
    active: ActiveAgentRegistry,
    counters: EvaluationCounters,
    clock: MonotonicClock,
    restart_window: RestartWindow,
    population_id: PopulationId,
    specie_ids: Vec<SpecieId>,
    trace: Trace,
    best_fitness: Vec<f64>,
}

impl Controller {
    fn new(
        ctx: RunContext,
        status: Arc<PopulationStatusCell>,
        cmd_rx: Receiver<ControlMsg>,
    ) -> Controller {
        let step_size = ctx.config.step_size;
        Controller {
            ctx,
            status,
            cmd_rx,
            active: ActiveAgentRegistry::new(),
            counters: EvaluationCounters::new(),
            clock: MonotonicClock::start(),
            restart_window: RestartWindow::default(),
            population_id: PopulationId::generate(),
            specie_ids: vec![],
            trace: Trace {
                stats: vec![],
                tot_evaluations: 0,
                step_size,
            },
            best_fitness: vec![],
        }
    }

    fn evaluation_options(&self, tune: bool) -> EvaluationOptions {
        EvaluationOptions {
            ro_signal: self.ctx.config.ro_signal.clone(),
            output_sat_limit: self.ctx.config.output_sat_limit,
            tune,
            ..Default::default()
        }
    }

    fn run(&mut self) -> Result<RunReport> {
        self.seed_population()?;
        info!(
            population = %self.population_id,
            species = self.specie_ids.len(),
            alg = ?self.ctx.config.evo_alg,
            "run started"
        );

        match self.ctx.config.evo_alg {
            EvoAlg::Generational => self.generational_loop()?,
            EvoAlg::SteadyState => self.steady_state_loop()?,
        }

        self.snapshot_stats(true)?;
        let _ = self.status.set_op_tag(OpTag::Done);
        let status = self.status.get();

        let population = Population {
            id: self.population_id,
            specie_ids: self.specie_ids.clone(),
            evo_alg: self.ctx.config.evo_alg,
            selection_algorithm: self.ctx.config.selection_algorithm,
            trace: Trace {
                tot_evaluations: status.tot_evaluations,
                ..self.trace.clone()
            },
        };
        let trace = population.trace.clone();
        self.ctx.store.write_population(population);

        info!(
            population = %self.population_id,
            generations = status.pop_gen,
            evaluations = status.tot_evaluations,
            best = ?self.best_fitness,
            "run finished"
        );
        Ok(RunReport {
            population_id: self.population_id,
            generations: status.pop_gen,
            tot_evaluations: status.tot_evaluations,
            best_fitness: self.best_fitness.clone(),
            goal_reached: status.goal_reached,
            trace,
        })
    }

    fn seed_population(&mut self) -> Result<()> {
        for constraint in self.ctx.config_constraints() {
            let specie_id = SpecieId::generate();
            let mut specie = Specie::new(specie_id, self.population_id, constraint.clone());
            for _ in 0..self.ctx.config.init_specie_size {
                let agent_id =
                    construct_agent(&self.ctx.store, &self.ctx.morphologies, &specie)?;
                specie.agent_ids.push(agent_id);
                specie.seed_agent_ids.push(agent_id);
                self.active.activate(agent_id);
            }
            self.ctx.store.write_specie(specie);
            self.specie_ids.push(specie_id);
        }
        self.ctx.store.write_population(Population {
            id: self.population_id,
            specie_ids: self.specie_ids.clone(),
            evo_alg: self.ctx.config.evo_alg,
            selection_algorithm: self.ctx.config.selection_algorithm,
            trace: self.trace.clone(),
        });
        Ok(())
    }

    /// Drain pending control commands; block while paused. Returns false
    /// once the op tag is `Done`.
    fn honor_op_tag(&mut self) -> bool {
        loop {
            while let Ok(msg) = self.cmd_rx.try_recv() {
                match msg {
                    ControlMsg::SetOpTag(tag) => {
                        if let Err(err) = self.status.set_op_tag(tag) {
                            warn!(%err, "ignored op-tag request");
                        }
                    }
                    ControlMsg::SetGoalReached => self.status.set_goal_reached(),
                }
            }
            match self.status.op_tag() {
                OpTag::Continue => return true,
                OpTag::Done => return false,
                OpTag::Pause => {
                    // Sleep on the command channel until something changes.
                    match self.cmd_rx.recv_timeout(Duration::from_millis(100)) {
                        Ok(msg) => match msg {
                            ControlMsg::SetOpTag(tag) => {
                                let _ = self.status.set_op_tag(tag);
                            }
                            ControlMsg::SetGoalReached => self.status.set_goal_reached(),
                        },
                        Err(_) => {}
                    }
                }
            }
        }
    }

    /// Evaluate one agent with crash supervision. A scape that stays
    /// silent scores zero; a crashed mesh restarts with exponential
    /// backoff, drawing on the run-wide rolling restart window. When the
    /// window is exhausted the run itself fails.
    fn supervised_evaluation(
        store: &Store,
        scapes: &ScapeRegistry,
        agent_id: &AgentId,
        options: &EvaluationOptions,
        window: &RestartWindow,
    ) -> Result<MeshResult> {
        let mut restarts: u32 = 0;
        loop {
            match evaluate_agent(store, scapes, agent_id, options) {
                Ok(result) => return Ok(result),
                Err(bardo_mesh::MeshError::MissingFitness(reason)) => {
                    warn!(agent = %agent_id, %reason, "scoring silent evaluation zero");
                    return Ok(Self::zero_result(store, agent_id)?);
                }
                Err(bardo_mesh::MeshError::TaskFailed(reason)) => {
                    if !window.try_restart() {
                        warn!(agent = %agent_id, %reason, "restart window exhausted");
                        return Err(PopulationError::SupervisionExhausted(format!(
                            "{} mesh restarts within {:?} while evaluating {}",
                            MAX_RESTARTS_PER_WINDOW, RESTART_WINDOW, agent_id
                        )));
                    }
                    warn!(agent = %agent_id, %reason, restarts, "restarting crashed mesh");
                    std::thread::sleep(RESTART_BACKOFF_BASE * 2u32.pow(restarts.min(6)));
                    restarts += 1;
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    fn zero_result(store: &Store, agent_id: &AgentId) -> Result<MeshResult> {
        let mut agent = store.read_agent(agent_id)?;
        agent.fitness = vec![0.0];
        agent.main_fitness = 0.0;
        store.write_agent(agent);
        Ok(MeshResult {
            agent_id: *agent_id,
            fitness: vec![0.0],
            main_fitness: 0.0,
            cycles: 0,
            time_ns: 0,
            goal_reached: false,
            tuning_attempts: 0,
        })
    }

    /// Fold a finished evaluation into the accounting and stats machinery.
    fn account(&mut self, specie_id: SpecieId, result: &MeshResult) -> Result<()> {
        let window = self.status.add_evaluation(result.cycles, result.time_ns);
        self.counters
            .add(specie_id, 1, result.cycles, result.time_ns);
        if result.goal_reached {
            self.status.set_goal_reached();
        }
        if result.fitness > self.best_fitness {
            self.best_fitness = result.fitness.clone();
        }
        if window >= self.ctx.config.step_size {
            self.snapshot_stats(false)?;
        }
        Ok(())
    }

    /// Snapshot every specie and prepend to the trace.
    fn snapshot_stats(&mut self, final_snapshot: bool) -> Result<()> {
        let (_evals, _cycles, _time) = self.status.take_window();
        let now = self.clock.now_ns();
        let mut round = Vec::with_capacity(self.specie_ids.len());
        for specie_id in &self.specie_ids {
            let mut specie = self.ctx.store.read_specie(specie_id)?;
            let (evals, _, _) = self.counters.get(specie_id);
            let validation = if final_snapshot {
                self.validation_fitness(&specie)?
            } else {
                None
            };
            let stat = specie_snapshot(&self.ctx.store, &specie, evals, now, validation)?;
            specie.stats.insert(0, stat.clone());
            self.ctx.store.write_specie(specie);
            round.push(stat);
        }
        self.trace.stats.insert(0, round);
        self.trace.tot_evaluations = self.status.tot_evaluations();
        Ok(())
    }

    /// Validation pass over the specie's best champion, when the run's op
    /// modes include validation.
    fn validation_fitness(&self, specie: &Specie) -> Result<Option<f64>> {
        if !self.ctx.config.op_modes.contains(&OpMode::Validation) {
            return Ok(None);
        }
        let Some(best) = specie
            .hall_of_fame
            .iter()
            .max_by(|a, b| a.main_fitness.total_cmp(&b.main_fitness))
        else {
            return Ok(None);
        };
        if !self.ctx.store.has_agent(&best.agent_id) {
            return Ok(None);
        }
        let options = self.evaluation_options(false);
        let result = Self::supervised_evaluation(
            &self.ctx.store,
            &self.ctx.scapes,
            &best.agent_id,
            &options,
            &self.restart_window,
        )?;
        Ok(Some(result.main_fitness))
    }

    fn stop_condition_met(&self) -> bool {
        let status = self.status.get();
        let config = &self.ctx.config;
        config.generation_limit.reached(status.pop_gen as f64)
            || config
                .evaluations_limit
                .reached(status.tot_evaluations as f64)
            || config
                .fitness_goal
                .exceeded(self.best_fitness.first().copied().unwrap_or(f64::NEG_INFINITY))
            || status.goal_reached
    }

    // --- Generational -------------------------------------------------------

    fn generational_loop(&mut self) -> Result<()> {
        let options = self.evaluation_options(true);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.ctx.config.max_parallel.max(1))
            .build()
            .map_err(|e| PopulationError::SupervisionExhausted(e.to_string()))?;

        loop {
            if !self.honor_op_tag() {
                break;
            }

            // Evaluate the whole generation, capped by the pool width.
            let mut batch: Vec<(SpecieId, AgentId)> = vec![];
            for specie_id in &self.specie_ids {
                let specie = self.ctx.store.read_specie(specie_id)?;
                for agent_id in &specie.agent_ids {
                    batch.push((*specie_id, *agent_id));
                }
            }
            let store = self.ctx.store.clone();
            let scapes = self.ctx.scapes.clone();
            let window = &self.restart_window;
            let results: Vec<(SpecieId, Result<MeshResult>)> = pool.install(|| {
                batch
                    .par_iter()
                    .map(|(specie_id, agent_id)| {
                        (
                            *specie_id,
                            Self::supervised_evaluation(&store, &scapes, agent_id, &options, window),
                        )
                    })
                    .collect()
            });
            for (specie_id, result) in results {
                let result = result?;
                self.active.deactivate(&result.agent_id).ok();
                self.account(specie_id, &result)?;
            }

            // Intraspecies selection.
            for specie_id in self.specie_ids.clone() {
                self.intraspecies_selection(&specie_id)?;
            }

            self.snapshot_stats(false)?;
            self.status.bump_generation();

            if self.stop_condition_met() {
                break;
            }
        }
        Ok(())
    }

    fn intraspecies_selection(&mut self, specie_id: &SpecieId) -> Result<()> {
        let mut specie = self.ctx.store.read_specie(specie_id)?;

        // Offer every current-generation agent to the hall of fame.
        let current = specie.agent_ids.clone();
        for agent_id in &current {
            let agent = self.ctx.store.read_agent(agent_id)?;
            let candidate = champion_of(&self.ctx.store, &specie, &agent)?;
            let outcome = update_hof(&mut specie, candidate);
            let accepted = outcome != HofOutcome::Rejected;
            if accepted {
                let mut agent = self.ctx.store.read_agent(agent_id)?;
                agent.champion = true;
                self.ctx.store.write_agent(agent);
            }
            if self.ctx.config.fitness_stagnation {
                let target = agent.parent_ids.first().copied().unwrap_or(agent.id);
                update_fs(&self.ctx.store, &target, accepted)?;
            }
            if let HofOutcome::Replaced(lost) = outcome {
                for lost_id in lost {
                    if !current.contains(&lost_id) {
                        let _ = self.ctx.store.delete_agent_cascade(&lost_id);
                    }
                }
            }
        }

        refresh_specie_fitness(&self.ctx.store, &mut specie)?;

        let champions: Vec<AgentId> =
            specie.hall_of_fame.iter().map(|c| c.agent_id).collect();
        let losers: Vec<AgentId> = current
            .iter()
            .filter(|id| !champions.contains(id))
            .copied()
            .collect();

        let next = assemble_next_generation(
            &self.ctx.store,
            &self.ctx.morphologies,
            &mut specie,
            &losers,
            &self.ctx.config,
        )?;
        for id in &losers {
            if !next.contains(id) {
                self.active.remove(id);
            }
        }
        for id in &next {
            self.active.activate(*id);
        }
        specie.agent_ids = next;
        self.ctx.store.write_specie(specie);
        Ok(())
    }

    // --- Steady state -------------------------------------------------------

    fn steady_state_loop(&mut self) -> Result<()> {
        let options = self.evaluation_options(true);

        // Prime the halls of fame with the seed agents.
        for specie_id in self.specie_ids.clone() {
            let specie = self.ctx.store.read_specie(&specie_id)?;
            for agent_id in specie.agent_ids.clone() {
                let result = Self::supervised_evaluation(
                    &self.ctx.store,
                    &self.ctx.scapes,
                    &agent_id,
                    &options,
                    &self.restart_window,
                )?;
                self.account(specie_id, &result)?;
                self.offer_to_hof(&specie_id, &agent_id)?;
            }
        }

        while !self.stop_condition_met() {
            if !self.honor_op_tag() {
                break;
            }
            for specie_id in self.specie_ids.clone() {
                let specie = self.ctx.store.read_specie(&specie_id)?;
                let parent =
                    pick_steady_state_parent(&specie, self.ctx.config.population_mgr_efficiency);
                let child = match parent {
                    Some(parent_id) => create_offspring(
                        &self.ctx.store,
                        &self.ctx.morphologies,
                        &parent_id,
                    )?,
                    None => construct_agent(&self.ctx.store, &self.ctx.morphologies, &specie)?,
                };

                let mut specie = self.ctx.store.read_specie(&specie_id)?;
                specie.agent_ids.push(child);
                // Cap the active set: drop the worst incumbent. Its
                // genotype survives only while the hall of fame holds it.
                while specie.agent_ids.len() > self.ctx.config.specie_size_limit.max(1) {
                    let mut worst: Option<(AgentId, f64)> = None;
                    for id in &specie.agent_ids {
                        if *id == child {
                            continue;
                        }
                        let fitness = self
                            .ctx
                            .store
                            .read_agent(id)
                            .map(|a| a.main_fitness)
                            .unwrap_or(f64::NEG_INFINITY);
                        if worst.map(|(_, w)| fitness < w).unwrap_or(true) {
                            worst = Some((*id, fitness));
                        }
                    }
                    let Some((worst_id, _)) = worst else {
                        break;
                    };
                    specie.agent_ids.retain(|id| *id != worst_id);
                    self.active.remove(&worst_id);
                    let championed = specie
                        .hall_of_fame
                        .iter()
                        .any(|c| c.agent_id == worst_id);
                    if !championed {
                        let _ = self.ctx.store.delete_agent_cascade(&worst_id);
                    }
                }
                self.ctx.store.write_specie(specie);

                self.active.activate(child);
                let result = Self::supervised_evaluation(
                    &self.ctx.store,
                    &self.ctx.scapes,
                    &child,
                    &options,
                    &self.restart_window,
                )?;
                self.active.deactivate(&child).ok();
                self.account(specie_id, &result)?;
                self.offer_to_hof(&specie_id, &child)?;

                if self.stop_condition_met() {
                    break;
                }
            }
        }
        Ok(())
    }

    fn offer_to_hof(&mut self, specie_id: &SpecieId, agent_id: &AgentId) -> Result<()> {
        let mut specie = self.ctx.store.read_specie(specie_id)?;
        let agent = self.ctx.store.read_agent(agent_id)?;
        let candidate = champion_of(&self.ctx.store, &specie, &agent)?;
        let outcome = update_hof(&mut specie, candidate);
        let accepted = outcome != HofOutcome::Rejected;
        if accepted {
            let mut agent = self.ctx.store.read_agent(agent_id)?;
            agent.champion = true;
            self.ctx.store.write_agent(agent);
        }
        if self.ctx.config.fitness_stagnation {
            let target = agent.parent_ids.first().copied().unwrap_or(agent.id);
            update_fs(&self.ctx.store, &target, accepted)?;
        }
        if let HofOutcome::Replaced(lost) = outcome {
            for lost_id in lost {
                if !specie.agent_ids.contains(&lost_id) {
                    let _ = self.ctx.store.delete_agent_cascade(&lost_id);
                }
            }
        }
        refresh_specie_fitness(&self.ctx.store, &mut specie)?;
        self.ctx.store.write_specie(specie);
        Ok(())
    }
}

impl RunContext {
    /// The constraints species are seeded from; an empty list gets one
    /// default-constraint specie so a run can never be empty.
    fn config_constraints(&self) -> Vec<Constraint> {
        if self.constraints.is_empty() {
            vec![Constraint::default()]
        } else {
            self.constraints.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restart_window_exhausts_after_budget() {
        let window = RestartWindow::default();
        for _ in 0..MAX_RESTARTS_PER_WINDOW {
            assert!(window.try_restart());
        }
        // The fifth restart within the window must escalate.
        assert!(!window.try_restart());
        assert!(!window.try_restart());
    }

    #[test]
    fn test_restart_window_forgets_old_entries() {
        let Some(stale) = Instant::now().checked_sub(RESTART_WINDOW + Duration::from_secs(1))
        else {
            // Clock too young to backdate entries; nothing to verify.
            return;
        };
        let window = RestartWindow::default();
        window
            .restarts
            .lock()
            .extend(std::iter::repeat(stale).take(MAX_RESTARTS_PER_WINDOW));
        // Entries older than the window no longer consume budget.
        assert!(window.try_restart());
    }
}
