//! Application-owned registry of profiles and the terrains they drive.

use std::collections::BTreeMap;
use std::time::Duration;
use std::time::Instant;

use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::profile::Profile;
use crate::profile::RebuildReport;
use crate::profile::Tiling;
use crate::surface::HostTerrain;
use crate::surface::RenderPath;
use crate::surface::SyncError;
use crate::surface::TerrainSurfaceBinding;
use crate::texture::ImageRef;

/// How long the cached list of live bindings is trusted.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(30);

pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// An optional collaborator (weather, seasons, ...) that wants to hear about
/// profile changes. Registered explicitly at startup.
pub trait SurfaceIntegration {
    fn name(&self) -> &str;

    fn profile_updated(&mut self, _profile: &Profile, _report: &RebuildReport) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProfileId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(usize);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("unknown profile {0:?}")]
    UnknownProfile(ProfileId),
    #[error("unknown terrain binding {0:?}")]
    UnknownBinding(BindingId),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Per-terrain results of [`SurfaceService::broadcast_profile_select`].
#[derive(Debug, Default)]
pub struct SelectOutcome {
    pub attached: Vec<(BindingId, RenderPath)>,
    pub failed: Vec<(BindingId, ServiceError)>,
}

struct Slot<T> {
    profile: Option<ProfileId>,
    binding: TerrainSurfaceBinding<T>,
}

pub struct SurfaceService<T> {
    profiles: Vec<Profile>,
    bindings: BTreeMap<BindingId, Slot<T>>,
    next_binding: usize,
    active: Vec<BindingId>,
    last_refresh: Option<Instant>,
    clock: Box<dyn Clock>,
    integrations: Vec<Box<dyn SurfaceIntegration>>,
}

impl<T: HostTerrain> Default for SurfaceService<T> {
    fn default() -> Self {
        Self::new(Box::new(SystemClock))
    }
}

impl<T: HostTerrain> SurfaceService<T> {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self {
            profiles: Vec::new(),
            bindings: BTreeMap::new(),
            next_binding: 0,
            active: Vec::new(),
            last_refresh: None,
            clock,
            integrations: Vec::new(),
        }
    }

    pub fn register_integration(&mut self, integration: Box<dyn SurfaceIntegration>) {
        info!(integration = integration.name(), "registered surface integration");
        self.integrations.push(integration);
    }

    pub fn add_profile(&mut self, profile: Profile) -> ProfileId {
        self.profiles.push(profile);
        ProfileId(self.profiles.len() - 1)
    }

    pub fn profile(&self, id: ProfileId) -> Option<&Profile> {
        self.profiles.get(id.0)
    }

    pub fn profile_mut(&mut self, id: ProfileId) -> Option<&mut Profile> {
        self.profiles.get_mut(id.0)
    }

    /// Takes ownership of a host terrain. It renders natively until a profile
    /// is selected for it.
    pub fn add_terrain(&mut self, terrain: T) -> BindingId {
        let id = BindingId(self.next_binding);
        self.next_binding += 1;
        self.bindings.insert(
            id,
            Slot {
                profile: None,
                binding: TerrainSurfaceBinding::new(terrain),
            },
        );
        self.active.push(id);
        id
    }

    /// Hands the terrain back to the caller. Ids are never reused.
    pub fn remove_terrain(&mut self, id: BindingId) -> Option<T> {
        let slot = self.bindings.remove(&id)?;
        self.active.retain(|active| *active != id);
        Some(slot.binding.into_terrain())
    }

    /// Number of bindings currently held, live or not yet swept.
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn binding(&self, id: BindingId) -> Option<&TerrainSurfaceBinding<T>> {
        self.bindings.get(&id).map(|slot| &slot.binding)
    }

    pub fn binding_mut(&mut self, id: BindingId) -> Option<&mut TerrainSurfaceBinding<T>> {
        self.bindings.get_mut(&id).map(|slot| &mut slot.binding)
    }

    pub fn profile_of(&self, id: BindingId) -> Option<ProfileId> {
        self.bindings.get(&id)?.profile
    }

    /// Attaches `profile` to one terrain.
    pub fn select_profile(&mut self, binding: BindingId, profile: ProfileId) -> Result<RenderPath, ServiceError> {
        let target = self
            .profiles
            .get_mut(profile.0)
            .ok_or(ServiceError::UnknownProfile(profile))?;
        let slot = self
            .bindings
            .get_mut(&binding)
            .ok_or(ServiceError::UnknownBinding(binding))?;

        let path = slot.binding.attach_profile(target)?;
        slot.profile = Some(profile);
        Ok(path)
    }

    /// Attaches `profile` to every live terrain. A terrain that fails is
    /// recorded and the rest are still attached.
    pub fn broadcast_profile_select(&mut self, profile: ProfileId) -> Result<SelectOutcome, ServiceError> {
        if self.profile(profile).is_none() {
            return Err(ServiceError::UnknownProfile(profile));
        }

        let mut outcome = SelectOutcome::default();
        for id in self.active_bindings(false) {
            match self.select_profile(id, profile) {
                Ok(path) => outcome.attached.push((id, path)),
                Err(err) => {
                    warn!(binding = ?id, %err, "profile select failed for terrain");
                    outcome.failed.push((id, err));
                }
            }
        }
        Ok(outcome)
    }

    fn users(&self, profile: ProfileId) -> Vec<BindingId> {
        self.bindings
            .iter()
            .filter(|(_, slot)| slot.profile == Some(profile))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Rebuilds `profile` once, rebinds every terrain using it and notifies
    /// integrations.
    pub fn broadcast_profile_update(&mut self, profile: ProfileId) -> Result<RebuildReport, ServiceError> {
        let target = self
            .profiles
            .get_mut(profile.0)
            .ok_or(ServiceError::UnknownProfile(profile))?;
        let report = target.rebuild(None);

        for slot in self.bindings.values_mut() {
            if slot.profile == Some(profile) {
                slot.binding.update_material(target);
            }
        }
        for integration in &mut self.integrations {
            integration.profile_updated(target, &report);
        }
        debug!(profile = target.name(), ?report, "broadcast profile update");
        Ok(report)
    }

    fn broadcast_layer(
        &mut self,
        profile: ProfileId,
        mut write: impl FnMut(&mut TerrainSurfaceBinding<T>) -> Result<(), SyncError>,
    ) -> Result<usize, ServiceError> {
        if self.profile(profile).is_none() {
            return Err(ServiceError::UnknownProfile(profile));
        }
        let mut written = 0;
        for id in self.users(profile) {
            let Some(binding) = self.binding_mut(id) else {
                continue;
            };
            match write(binding) {
                Ok(()) => written += 1,
                Err(err) => warn!(%err, "skipping terrain during layer broadcast"),
            }
        }
        Ok(written)
    }

    /// Writes an albedo into one native paint slot of every terrain using
    /// `profile`. Returns how many terrains were written.
    pub fn broadcast_albedo_switch(
        &mut self,
        profile: ProfileId,
        layer: usize,
        albedo: Option<ImageRef>,
        tiling: Option<Tiling>,
    ) -> Result<usize, ServiceError> {
        self.broadcast_layer(profile, |binding| {
            binding.replace_albedo(layer, albedo.clone(), tiling)
        })
    }

    pub fn broadcast_normal_switch(
        &mut self,
        profile: ProfileId,
        layer: usize,
        normal: Option<ImageRef>,
        tiling: Option<Tiling>,
    ) -> Result<usize, ServiceError> {
        self.broadcast_layer(profile, |binding| {
            binding.replace_normal(layer, normal.clone(), tiling)
        })
    }

    pub fn profile_is_active(&mut self, profile: ProfileId) -> bool {
        let active = self.active_bindings(false);
        active.iter().any(|id| self.profile_of(*id) == Some(profile))
    }

    /// Live bindings. The cached list is rebuilt when forced or when older
    /// than [`REFRESH_INTERVAL`]; bindings whose terrain is gone are dropped.
    pub fn active_bindings(&mut self, force: bool) -> Vec<BindingId> {
        let now = self.clock.now();
        let stale = match self.last_refresh {
            Some(last) => now.saturating_duration_since(last) >= REFRESH_INTERVAL,
            None => true,
        };
        if force || stale {
            self.refresh(now);
        }
        self.active.clone()
    }

    fn refresh(&mut self, now: Instant) {
        let before = self.bindings.len();
        self.bindings.retain(|_, slot| slot.binding.terrain().is_alive());
        let dropped = before - self.bindings.len();
        self.active = self.bindings.keys().copied().collect();
        self.last_refresh = Some(now);
        debug!(live = self.active.len(), dropped, "refreshed terrain bindings");
    }
}
