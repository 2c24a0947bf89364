//! The spin session state machine.
//!
//! Each external call is split into a synchronous `begin_*` and `finish_*`/
//! `complete_*` pair so a host can release its lock while the call is in
//! flight. [`SpinSession::activate`], [`SpinSession::reload`] and
//! [`SpinSession::spin`] glue the pairs together around the awaited call.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use validator::Validate;

use crate::config::WheelConfig;
use crate::error::{ServiceError, SpinError, SpinErrorKind};
use crate::events::SessionEvents;
use crate::reward_matcher::{match_section, PlayResponse, RewardGrant};
use crate::reward_pool::{build_pool, shuffle, RewardEntry};
use crate::rotation::{target_rotation, SectionGeometry};
use crate::rules::{select_rule, EligibleRule, Rule};
use crate::shared_wheel_game::{SpinChances, SpinPhase, WheelSection, WheelSnapshot};
use crate::sources::{PlayRequest, PlaySource, RuleSource, WheelDriver};

/// How a completed play action ended up on the wheel.
#[derive(Debug, Clone, PartialEq)]
pub enum SpinOutcome {
    /// The wheel was told to turn to `rotation` and stop on `section`.
    Landed { section: usize, angle: f64, rotation: f64 },
    /// The grant has no section on this wheel. Nothing turned, the chance is used up.
    Unmatched { grant: RewardGrant },
}

#[derive(Debug)]
pub struct SpinSession {
    config: WheelConfig,
    phase: SpinPhase,
    chances: SpinChances,
    input_armed: bool,
    eligible: Option<EligibleRule>,
    pool: Vec<RewardEntry>,
    geometry: Option<SectionGeometry>,
    last_grant: Option<RewardGrant>,
    target_section: Option<usize>,
    target_rotation: Option<f64>,
    rng: StdRng,
    events: SessionEvents,
}

impl SpinSession {
    pub fn new(config: WheelConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_rng(config: WheelConfig, rng: StdRng) -> Self {
        let chances = SpinChances::new(config.total_spin_chance);
        Self {
            config,
            phase: SpinPhase::Uninitialized,
            chances,
            input_armed: false,
            eligible: None,
            pool: Vec::new(),
            geometry: None,
            last_grant: None,
            target_section: None,
            target_rotation: None,
            rng,
            events: SessionEvents::default(),
        }
    }

    pub fn config(&self) -> &WheelConfig {
        &self.config
    }

    pub fn phase(&self) -> SpinPhase {
        self.phase
    }

    pub fn chances(&self) -> SpinChances {
        self.chances
    }

    pub fn chances_remaining(&self) -> u32 {
        self.chances.remaining()
    }

    pub fn is_input_armed(&self) -> bool {
        self.input_armed
    }

    pub fn eligible_rule(&self) -> Option<&EligibleRule> {
        self.eligible.as_ref()
    }

    pub fn pool(&self) -> &[RewardEntry] {
        &self.pool
    }

    pub fn last_grant(&self) -> Option<&RewardGrant> {
        self.last_grant.as_ref()
    }

    pub fn target_section(&self) -> Option<usize> {
        self.target_section
    }

    pub fn target_rotation(&self) -> Option<f64> {
        self.target_rotation
    }

    pub fn events_mut(&mut self) -> &mut SessionEvents {
        &mut self.events
    }

    fn publish(&mut self, err: &SpinError) {
        log::warn!("Wheel error {}", err);
        if err.is_published() {
            self.events.on_error.emit(err);
        }
    }

    /// Arms input when there is a pool to spin and chances left.
    fn rearm(&mut self) {
        self.phase = SpinPhase::Ready;
        self.input_armed = !self.pool.is_empty() && self.chances.remaining() > 0;
    }

    // === Loading ===

    /// Starts a load and returns the action whose rules should be fetched.
    pub fn begin_load(&mut self) -> Result<String, SpinError> {
        match self.phase {
            SpinPhase::Uninitialized | SpinPhase::Ready | SpinPhase::Failed => {}
            _ => return Err(SpinError::spin_not_accepted()),
        }
        if !self.config.has_credentials() {
            let err = SpinError::configuration_missing();
            self.input_armed = false;
            self.publish(&err);
            return Err(err);
        }
        if let Err(e) = self.config.validate() {
            let err = SpinError::invalid_configuration(&e.to_string());
            self.input_armed = false;
            self.publish(&err);
            return Err(err);
        }
        self.phase = SpinPhase::Loading;
        self.input_armed = false;
        log::debug!("Loading rules for action '{}'", self.config.target_action);
        Ok(self.config.target_action.clone())
    }

    fn prepare_pool(&mut self, rules: &[Rule]) -> Result<(EligibleRule, Vec<RewardEntry>, SectionGeometry), SpinError> {
        let eligible = select_rule(
            rules,
            &self.config.target_tag,
            &self.config.custom_param_name,
            &self.config.custom_param_values,
            &mut self.rng,
        )
        .ok_or_else(SpinError::no_applicable_rule)?;

        let mut pool = build_pool(&eligible.rule);
        if pool.is_empty() {
            return Err(SpinError::empty_reward_pool());
        }
        let geometry = SectionGeometry::new(pool.len())?;
        shuffle(&mut pool, &mut self.rng);
        Ok((eligible, pool, geometry))
    }

    /// Applies the outcome of a rule fetch started by [`Self::begin_load`].
    ///
    /// On failure a pool from an earlier load stays in play; without one the
    /// session parks in `Failed` with input disarmed.
    pub fn finish_load(&mut self, fetched: Result<Vec<Rule>, ServiceError>) -> Result<(), SpinError> {
        if self.phase != SpinPhase::Loading {
            return Err(SpinError::spin_not_accepted());
        }

        let prepared = fetched
            .map_err(|e| SpinError::rule_fetch_failed(&e))
            .and_then(|rules| self.prepare_pool(&rules));

        match prepared {
            Ok((eligible, pool, geometry)) => {
                log::info!(
                    "Wheel ready with rule '{}' ({} sections, {} chances left)",
                    eligible.rule.rule_id,
                    pool.len(),
                    self.chances.remaining()
                );
                self.eligible = Some(eligible);
                self.pool = pool;
                self.geometry = Some(geometry);
                self.target_section = None;
                self.rearm();
                self.events.on_ready.emit(&self.pool);
                Ok(())
            }
            Err(err) => {
                if self.pool.is_empty() {
                    self.phase = SpinPhase::Failed;
                    self.input_armed = false;
                } else {
                    self.rearm();
                }
                self.publish(&err);
                Err(err)
            }
        }
    }

    /// First load of the session.
    pub async fn activate<S: RuleSource + ?Sized>(&mut self, source: &S) -> Result<(), SpinError> {
        let action = self.begin_load()?;
        let fetched = source.fetch_rules(&action).await;
        self.finish_load(fetched)
    }

    /// Fetches rules again and replaces the pool. Not available before activation.
    pub async fn reload<S: RuleSource + ?Sized>(&mut self, source: &S) -> Result<(), SpinError> {
        if self.phase == SpinPhase::Uninitialized {
            return Err(SpinError::spin_not_accepted());
        }
        self.activate(source).await
    }

    // === Spinning ===

    /// Starts a spin. Input is disarmed before this returns, so a second
    /// spin is refused until this one completes.
    pub fn begin_spin(&mut self) -> Result<PlayRequest, SpinError> {
        if self.phase != SpinPhase::Ready || !self.input_armed {
            return Err(SpinError::spin_not_accepted());
        }
        let Some(player_id) = self.config.player().map(str::to_string) else {
            let err = SpinError::player_id_missing();
            self.publish(&err);
            return Err(err);
        };
        let Some(matched_param_value) = self.eligible.as_ref().map(|e| e.matched_param_value.clone()) else {
            return Err(SpinError::spin_not_accepted());
        };

        let mut params = BTreeMap::new();
        params.insert(self.config.custom_param_name.clone(), matched_param_value);
        let request = PlayRequest {
            action: self.config.target_action.clone(),
            player_id,
            params,
        };

        self.input_armed = false;
        self.phase = SpinPhase::Spinning;
        self.last_grant = None;
        self.target_section = None;
        self.target_rotation = None;
        log::debug!("Spin started for player '{}'", request.player_id);
        Ok(request)
    }

    fn abort_spin(&mut self, err: SpinError) -> Result<SpinOutcome, SpinError> {
        self.rearm();
        self.publish(&err);
        Err(err)
    }

    /// Applies the outcome of the play action started by [`Self::begin_spin`].
    pub fn complete_spin<W: WheelDriver + ?Sized>(
        &mut self,
        result: Result<Option<PlayResponse>, ServiceError>,
        wheel: &mut W,
    ) -> Result<SpinOutcome, SpinError> {
        if self.phase != SpinPhase::Spinning {
            return Err(SpinError::spin_not_accepted());
        }

        let grant = match result {
            Err(e) => return self.abort_spin(SpinError::grant_fetch_failed(&e)),
            Ok(None) => return self.abort_spin(SpinError::no_reward_result()),
            Ok(Some(response)) => match response.events.into_iter().next() {
                Some(grant) => grant,
                None => return self.abort_spin(SpinError::empty_grant_events()),
            },
        };
        self.last_grant = Some(grant.clone());

        let Some(section) = match_section(&grant, &self.pool) else {
            // no section to land on: skip the animation but still spend the chance
            self.phase = SpinPhase::Settling;
            self.events.on_success.emit(&grant);
            let err = SpinError::new(
                SpinErrorKind::UnmatchedGrant,
                format!(
                    "Granted {} '{}' has no section on this wheel",
                    grant.kind,
                    grant.value.as_ref().map(|v| v.to_string()).unwrap_or_default()
                ),
            );
            self.publish(&err);
            self.settle();
            return Ok(SpinOutcome::Unmatched { grant });
        };

        let geometry = match self.geometry {
            Some(geometry) => Ok(geometry),
            None => SectionGeometry::new(self.pool.len()),
        };
        let angle = match geometry.and_then(|g| g.angle_for(section, &mut self.rng)) {
            Ok(angle) => angle,
            Err(err) => return self.abort_spin(err),
        };
        let rotation = target_rotation(self.config.base_revolution_degrees, self.chances.consumed, angle);

        self.target_section = Some(section);
        self.target_rotation = Some(rotation);
        self.phase = SpinPhase::Settling;
        log::info!("Grant matched section {}, rotating to {:.2}°", section, rotation);
        wheel.rotate_to(rotation);

        self.events.on_success.emit(&grant);
        self.events.on_known_result_reward.emit(&self.pool[section]);
        Ok(SpinOutcome::Landed { section, angle, rotation })
    }

    /// Runs one full spin against the play source.
    pub async fn spin<P, W>(&mut self, source: &P, wheel: &mut W) -> Result<SpinOutcome, SpinError>
    where
        P: PlaySource + ?Sized,
        W: WheelDriver + ?Sized,
    {
        let request = self.begin_spin()?;
        let result = source
            .execute_rule(&request.action, &request.player_id, &request.params)
            .await;
        self.complete_spin(result, wheel)
    }

    // === Settling ===

    fn settle(&mut self) -> SpinPhase {
        self.chances.consume();
        if self.chances.remaining() > 0 {
            self.rearm();
        } else {
            self.phase = SpinPhase::Exhausted;
            self.input_armed = false;
            log::info!("All {} chances used, wheel exhausted", self.chances.total);
        }
        self.phase
    }

    /// Called once the wheel animation has come to rest.
    pub fn animation_settled(&mut self) -> Result<SpinPhase, SpinError> {
        if self.phase != SpinPhase::Settling {
            return Err(SpinError::spin_not_accepted());
        }
        Ok(self.settle())
    }

    pub fn snapshot(&self) -> WheelSnapshot {
        let levels = &self.config.point_reward_levels;
        let sections = match self.geometry.as_ref() {
            Some(geometry) => self
                .pool
                .iter()
                .zip(geometry.arcs())
                .enumerate()
                .map(|(index, (reward, arc))| WheelSection {
                    index,
                    label: reward.label(),
                    image: reward.image_ref(levels),
                    arc,
                    reward: reward.clone(),
                })
                .collect(),
            None => Vec::new(),
        };

        WheelSnapshot {
            phase: self.phase,
            chances: self.chances,
            chances_remaining: self.chances.remaining(),
            input_armed: self.input_armed,
            rule_id: self.eligible.as_ref().map(|e| e.rule.rule_id.clone()),
            sections,
            last_grant: self.last_grant.clone(),
            target_section: self.target_section,
            target_rotation: self.target_rotation,
        }
    }
}
