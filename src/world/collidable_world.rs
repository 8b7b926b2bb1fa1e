use std::collections::{BTreeSet, HashMap};

use slab::Slab;

use na::RealField;
use ncollide::bounding_volume::AABB;
use ncollide::pipeline::broad_phase::{
    BroadPhase, BroadPhaseInterferenceHandler, BroadPhaseProxyHandle, DBVTBroadPhase,
};

use crate::counters::Counters;
use crate::error::CordeError;
use crate::object::{Collidable, CollidableHandle};

fn sort_pair(
    h1: CollidableHandle,
    h2: CollidableHandle,
) -> (CollidableHandle, CollidableHandle) {
    if h2 < h1 {
        (h2, h1)
    } else {
        (h1, h2)
    }
}

fn pair_excluded<N: RealField>(
    objects: &Slab<Box<dyn Collidable<N>>>,
    h1: CollidableHandle,
    h2: CollidableHandle,
) -> bool {
    let o1 = match objects.get(h1.0) {
        Some(o) => o,
        None => return true,
    };
    let o2 = match objects.get(h2.0) {
        Some(o) => o,
        None => return true,
    };

    o1.collision_disabled().contains(&h2) || o2.collision_disabled().contains(&h1)
}

struct WorldInterferenceHandler<'a, N: RealField> {
    objects: &'a Slab<Box<dyn Collidable<N>>>,
    started: Vec<(CollidableHandle, CollidableHandle)>,
    stopped: Vec<(CollidableHandle, CollidableHandle)>,
}

impl<'a, N: RealField> BroadPhaseInterferenceHandler<CollidableHandle>
    for WorldInterferenceHandler<'a, N>
{
    fn is_interference_allowed(&mut self, h1: &CollidableHandle, h2: &CollidableHandle) -> bool {
        *h1 != *h2 && !pair_excluded(self.objects, *h1, *h2)
    }

    fn interference_started(&mut self, h1: &CollidableHandle, h2: &CollidableHandle) {
        self.started.push(sort_pair(*h1, *h2));
    }

    fn interference_stopped(&mut self, h1: &CollidableHandle, h2: &CollidableHandle) {
        self.stopped.push(sort_pair(*h1, *h2));
    }
}

/// The registry of every collidable and the broadphase over their aggregate
/// bounds.
///
/// The world steps every registered object with the two-phase protocol:
/// speculative prediction, broadphase update on the speculative bounds, pair
/// dispatch, commit, then constraint solving.
pub struct CollidableWorld<N: RealField> {
    objects: Slab<Box<dyn Collidable<N>>>,
    broad_phase: Box<dyn BroadPhase<N, AABB<N>, CollidableHandle>>,
    proxies: HashMap<CollidableHandle, BroadPhaseProxyHandle>,
    pairs: BTreeSet<(CollidableHandle, CollidableHandle)>,
    counters: Counters,
}

impl<N: RealField> CollidableWorld<N> {
    /// Creates an empty world.
    ///
    /// The `margin` is the extra inflation the broadphase applies to every
    /// aggregate bound it stores.
    pub fn new(margin: N) -> Self {
        CollidableWorld {
            objects: Slab::new(),
            broad_phase: Box::new(DBVTBroadPhase::new(margin)),
            proxies: HashMap::new(),
            pairs: BTreeSet::new(),
            counters: Counters::new(false),
        }
    }

    /// Registers a collidable and returns its handle.
    pub fn add(&mut self, object: Box<dyn Collidable<N>>) -> CollidableHandle {
        let key = self.objects.insert(object);
        let handle = CollidableHandle(key);
        let aabb = self.objects[key].aabb();
        let proxy = self.broad_phase.create_proxy(aabb, handle);
        self.proxies.insert(handle, proxy);
        handle
    }

    /// Unregisters a collidable and returns it.
    ///
    /// Its broadphase proxy and every pair involving it are dropped.
    pub fn remove(&mut self, handle: CollidableHandle) -> Option<Box<dyn Collidable<N>>> {
        if let Some(proxy) = self.proxies.remove(&handle) {
            self.broad_phase.remove(&[proxy], &mut |_, _| {});
        }

        if self.objects.contains(handle.0) {
            self.pairs.retain(|(a, b)| *a != handle && *b != handle);
            Some(self.objects.remove(handle.0))
        } else {
            None
        }
    }

    /// The collidable with the given handle.
    pub fn collidable(&self, handle: CollidableHandle) -> Option<&dyn Collidable<N>> {
        self.objects.get(handle.0).map(|o| &**o)
    }

    /// The mutable collidable with the given handle.
    pub fn collidable_mut(&mut self, handle: CollidableHandle) -> Option<&mut dyn Collidable<N>> {
        self.objects.get_mut(handle.0).map(|o| &mut **o)
    }

    /// The performance counters of this world.
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// The mutable performance counters of this world.
    pub fn counters_mut(&mut self) -> &mut Counters {
        &mut self.counters
    }

    /// The active broadphase pairs, in canonical order.
    pub fn contact_pairs(
        &self,
    ) -> impl Iterator<Item = (CollidableHandle, CollidableHandle)> + '_ {
        self.pairs.iter().copied()
    }

    /// Republish the aggregate bound of every registered collidable.
    ///
    /// Takes effect at the next broadphase update.
    pub fn sync_bounds(&mut self) {
        for (handle, proxy) in &self.proxies {
            if let Some(object) = self.objects.get(handle.0) {
                self.broad_phase
                    .deferred_set_bounding_volume(*proxy, object.aabb());
            }
        }
    }

    /// Force every pair to be re-tested against the exclusion sets at the
    /// next broadphase update.
    ///
    /// Call this after mutating an exclusion set outside of a step.
    pub fn refresh_pair_filters(&mut self) {
        self.broad_phase.deferred_recompute_all_proximities();
    }

    /// Run the broadphase on the published bounds and update the pair set.
    pub fn perform_broad_phase(&mut self) {
        self.counters.broad_phase_started();

        let mut handler = WorldInterferenceHandler {
            objects: &self.objects,
            started: Vec::new(),
            stopped: Vec::new(),
        };

        self.broad_phase.update(&mut handler);

        let WorldInterferenceHandler {
            started, stopped, ..
        } = handler;

        for pair in stopped {
            self.pairs.remove(&pair);
        }

        for pair in started {
            self.pairs.insert(pair);
        }

        self.counters.set_ncontact_pairs(self.pairs.len());
        self.counters.broad_phase_completed();
    }

    /// Invoke the collision handler of both members of every active pair.
    ///
    /// Exclusion sets are re-checked here so pairs formed before an
    /// exclusion was added are still suppressed.
    pub fn dispatch_collisions(&mut self) {
        self.counters.dispatch_started();

        let mut nignored = 0;
        let pairs: Vec<_> = self.pairs.iter().copied().collect();

        for (h1, h2) in pairs {
            if !self.objects.contains(h1.0) || !self.objects.contains(h2.0) {
                continue;
            }

            if pair_excluded(&self.objects, h1, h2) {
                nignored += 1;
                continue;
            }

            if let Some((o1, o2)) = self.objects.get2_mut(h1.0, h2.0) {
                o1.handle_collision(&**o2);
                o2.handle_collision(&**o1);
            }
        }

        self.counters.set_nignored_pairs(nignored);
        self.counters.dispatch_completed();
    }

    /// Advance the whole world by one tick of length `dt`.
    ///
    /// The timestep is validated before any object is touched; a
    /// non-positive `dt` leaves the world unchanged.
    pub fn step(&mut self, dt: N) -> Result<(), CordeError> {
        if dt <= N::zero() {
            return Err(CordeError::InvalidTimestep);
        }

        self.counters.step_started();

        for (_, object) in self.objects.iter_mut() {
            object.predict_motion(dt)?;
        }

        self.sync_bounds();
        self.perform_broad_phase();
        self.dispatch_collisions();

        for (_, object) in self.objects.iter_mut() {
            object.integrate_motion(dt)?;
        }

        for (_, object) in self.objects.iter_mut() {
            object.solve_constraints();
        }

        self.counters.step_completed();
        Ok(())
    }
}
