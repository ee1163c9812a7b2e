//! Descriptor allocator: set layouts, budgeted pools and set writers.
//!
//! Layouts and pools are built once at startup through fluent builders.
//! [`DescriptorPool`] tracks its budget on the CPU, so exhaustion is reported
//! on exactly the allocation that exceeds it, independent of how the driver
//! rounds pool sizes. [`DescriptorWriter`] collects buffer and image writes
//! against a layout and commits them in one update.
//!
//! Misuse (duplicate layout slots, writes that do not match the layout,
//! building an incomplete set) panics. Running out of pool space is an
//! expected condition and comes back as `Ok(None)`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use cadence_rhi::{
    DescriptorKind, DescriptorResource, DescriptorWrite, GraphicsBackend, LayoutBinding, PoolSize,
    RhiResult,
};

/// Per-kind descriptor counts.
type Budget = BTreeMap<DescriptorKind, u32>;

/// Default upper bound on sets allocated from one pool.
pub const DEFAULT_MAX_SETS: u32 = 1000;

/// Immutable mapping from binding slot to resource kind, stages and count.
pub struct DescriptorSetLayout<B: GraphicsBackend> {
    raw: B::SetLayout,
    bindings: BTreeMap<u32, LayoutBinding>,
}

impl<B: GraphicsBackend> DescriptorSetLayout<B> {
    pub fn builder(backend: &Arc<B>) -> DescriptorSetLayoutBuilder<B> {
        DescriptorSetLayoutBuilder {
            backend: backend.clone(),
            bindings: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn raw(&self) -> &B::SetLayout {
        &self.raw
    }

    /// The binding declared at `slot`, if any.
    #[inline]
    pub fn binding(&self, slot: u32) -> Option<&LayoutBinding> {
        self.bindings.get(&slot)
    }

    /// Bindings in slot order.
    pub fn bindings(&self) -> impl Iterator<Item = &LayoutBinding> {
        self.bindings.values()
    }

    /// Descriptors of each kind one set of this layout consumes.
    fn requirements(&self) -> Budget {
        let mut budget = Budget::new();
        for binding in self.bindings.values() {
            *budget.entry(binding.kind).or_insert(0) += binding.count;
        }
        budget
    }
}

pub struct DescriptorSetLayoutBuilder<B: GraphicsBackend> {
    backend: Arc<B>,
    bindings: BTreeMap<u32, LayoutBinding>,
}

impl<B: GraphicsBackend> DescriptorSetLayoutBuilder<B> {
    /// Declares a single-descriptor binding.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is already declared.
    pub fn add_binding(self, slot: u32, kind: DescriptorKind, stages: vk::ShaderStageFlags) -> Self {
        self.add_binding_array(slot, kind, stages, 1)
    }

    /// Declares a binding holding `count` descriptors.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is already declared or `count` is zero.
    pub fn add_binding_array(
        mut self,
        slot: u32,
        kind: DescriptorKind,
        stages: vk::ShaderStageFlags,
        count: u32,
    ) -> Self {
        assert!(count > 0, "binding {slot} must hold at least one descriptor");
        assert!(
            !self.bindings.contains_key(&slot),
            "binding {slot} is already in use"
        );
        self.bindings.insert(
            slot,
            LayoutBinding {
                binding: slot,
                kind,
                stages,
                count,
            },
        );
        self
    }

    pub fn build(self) -> RhiResult<DescriptorSetLayout<B>> {
        let bindings: Vec<LayoutBinding> = self.bindings.values().copied().collect();
        let raw = self.backend.create_set_layout(&bindings)?;
        Ok(DescriptorSetLayout {
            raw,
            bindings: self.bindings,
        })
    }
}

/// Fixed-budget source of descriptor sets.
///
/// Not thread-safe; allocate, free and reset from the frame thread.
pub struct DescriptorPool<B: GraphicsBackend> {
    raw: B::DescriptorPool,
    backend: Arc<B>,
    max_sets: u32,
    capacity: Budget,
    available: Budget,
    available_sets: u32,
    /// What each live set took from the budget.
    outstanding: HashMap<B::DescriptorSet, Budget>,
}

impl<B: GraphicsBackend> DescriptorPool<B> {
    pub fn builder(backend: &Arc<B>) -> DescriptorPoolBuilder<B> {
        DescriptorPoolBuilder {
            backend: backend.clone(),
            sizes: Budget::new(),
            max_sets: DEFAULT_MAX_SETS,
        }
    }

    /// Draws one set for `layout` from the budget.
    ///
    /// Returns `Ok(None)` if the budget (or the device pool) cannot hold
    /// another set of this layout. Nothing is consumed in that case.
    pub fn allocate(
        &mut self,
        layout: &DescriptorSetLayout<B>,
    ) -> RhiResult<Option<B::DescriptorSet>> {
        let required = layout.requirements();

        if self.available_sets == 0 {
            debug!("Descriptor pool exhausted: all {} sets in use", self.max_sets);
            return Ok(None);
        }
        for (kind, &count) in &required {
            let left = self.available.get(kind).copied().unwrap_or(0);
            if left < count {
                debug!(
                    "Descriptor pool exhausted: {:?} needs {}, {} left",
                    kind, count, left
                );
                return Ok(None);
            }
        }

        let Some(set) = self.backend.allocate_descriptor_set(&self.raw, &layout.raw)? else {
            return Ok(None);
        };

        for (kind, count) in &required {
            if let Some(left) = self.available.get_mut(kind) {
                *left -= count;
            }
        }
        self.available_sets -= 1;
        self.outstanding.insert(set, required);
        Ok(Some(set))
    }

    /// Returns `sets` to the pool. They must no longer be referenced by
    /// recorded or in-flight command buffers.
    ///
    /// # Panics
    ///
    /// Panics if a set was not allocated from this pool, was already freed,
    /// or appears more than once in `sets`.
    pub fn free(&mut self, sets: &[B::DescriptorSet]) -> RhiResult<()> {
        let mut seen = HashSet::with_capacity(sets.len());
        for set in sets {
            assert!(
                self.outstanding.contains_key(set),
                "descriptor set {set:?} is not live in this pool"
            );
            assert!(
                seen.insert(set),
                "descriptor set {set:?} is freed twice in one call"
            );
        }
        self.backend.free_descriptor_sets(&self.raw, sets)?;

        for set in sets {
            if let Some(taken) = self.outstanding.remove(set) {
                for (kind, count) in taken {
                    *self.available.entry(kind).or_insert(0) += count;
                }
                self.available_sets += 1;
            }
        }
        Ok(())
    }

    /// Returns every set to the pool at once.
    ///
    /// All sets previously allocated from this pool become invalid; holding
    /// on to one afterwards is a caller error.
    pub fn reset(&mut self) -> RhiResult<()> {
        self.backend.reset_descriptor_pool(&self.raw)?;
        self.available = self.capacity.clone();
        self.available_sets = self.max_sets;
        self.outstanding.clear();
        debug!("Descriptor pool reset ({} sets available)", self.max_sets);
        Ok(())
    }

    /// Sets currently allocated.
    #[inline]
    pub fn live_sets(&self) -> usize {
        self.outstanding.len()
    }

    /// Descriptors of `kind` still available.
    #[inline]
    pub fn remaining(&self, kind: DescriptorKind) -> u32 {
        self.available.get(&kind).copied().unwrap_or(0)
    }

    #[inline]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }
}

pub struct DescriptorPoolBuilder<B: GraphicsBackend> {
    backend: Arc<B>,
    sizes: Budget,
    max_sets: u32,
}

impl<B: GraphicsBackend> DescriptorPoolBuilder<B> {
    /// Adds `count` descriptors of `kind` to the budget. Repeated kinds accumulate.
    pub fn pool_size(mut self, kind: DescriptorKind, count: u32) -> Self {
        *self.sizes.entry(kind).or_insert(0) += count;
        self
    }

    /// Caps the number of sets live at once. Defaults to [`DEFAULT_MAX_SETS`].
    pub fn max_sets(mut self, max_sets: u32) -> Self {
        self.max_sets = max_sets;
        self
    }

    pub fn build(self) -> RhiResult<DescriptorPool<B>> {
        let sizes: Vec<PoolSize> = self
            .sizes
            .iter()
            .map(|(&kind, &count)| PoolSize { kind, count })
            .collect();
        let raw = self.backend.create_descriptor_pool(self.max_sets, &sizes)?;

        Ok(DescriptorPool {
            raw,
            backend: self.backend,
            max_sets: self.max_sets,
            available: self.sizes.clone(),
            capacity: self.sizes,
            available_sets: self.max_sets,
            outstanding: HashMap::new(),
        })
    }
}

type Write<B> = DescriptorWrite<<B as GraphicsBackend>::BufferInfo, <B as GraphicsBackend>::ImageInfo>;

/// Collects resource writes for one set of `layout`.
///
/// Each write is checked against the slot's declared kind when it is added.
/// Writing the same slot twice keeps the later resource.
pub struct DescriptorWriter<'a, B: GraphicsBackend> {
    layout: &'a DescriptorSetLayout<B>,
    pool: &'a mut DescriptorPool<B>,
    writes: BTreeMap<u32, Write<B>>,
}

impl<'a, B: GraphicsBackend> DescriptorWriter<'a, B> {
    pub fn new(layout: &'a DescriptorSetLayout<B>, pool: &'a mut DescriptorPool<B>) -> Self {
        Self {
            layout,
            pool,
            writes: BTreeMap::new(),
        }
    }

    /// # Panics
    ///
    /// Panics if `slot` is not a single buffer binding of the layout.
    pub fn write_buffer(mut self, slot: u32, info: B::BufferInfo) -> Self {
        let kind = self.checked_kind(slot, false);
        self.writes.insert(
            slot,
            DescriptorWrite {
                binding: slot,
                kind,
                resource: DescriptorResource::Buffer(info),
            },
        );
        self
    }

    /// # Panics
    ///
    /// Panics if `slot` is not a single image binding of the layout.
    pub fn write_image(mut self, slot: u32, info: B::ImageInfo) -> Self {
        let kind = self.checked_kind(slot, true);
        self.writes.insert(
            slot,
            DescriptorWrite {
                binding: slot,
                kind,
                resource: DescriptorResource::Image(info),
            },
        );
        self
    }

    /// Allocates a fresh set from the pool and commits every write to it.
    ///
    /// Returns `Ok(None)` if the pool is exhausted.
    ///
    /// # Panics
    ///
    /// Panics if any slot of the layout has not been written.
    pub fn build(self) -> RhiResult<Option<B::DescriptorSet>> {
        self.assert_complete();
        let Some(set) = self.pool.allocate(self.layout)? else {
            return Ok(None);
        };
        self.commit(set);
        Ok(Some(set))
    }

    /// Commits every write to an already allocated `set`.
    ///
    /// # Panics
    ///
    /// Panics if any slot of the layout has not been written.
    pub fn overwrite(&self, set: B::DescriptorSet) {
        self.assert_complete();
        self.commit(set);
    }

    fn commit(&self, set: B::DescriptorSet) {
        let writes: Vec<Write<B>> = self.writes.values().copied().collect();
        self.pool.backend.update_descriptor_set(set, &writes);
    }

    fn checked_kind(&self, slot: u32, image: bool) -> DescriptorKind {
        let binding = self
            .layout
            .binding(slot)
            .unwrap_or_else(|| panic!("layout has no binding {slot}"));
        assert_eq!(
            binding.kind.is_image(),
            image,
            "binding {slot} holds {:?}, which does not match the written resource",
            binding.kind
        );
        assert_eq!(
            binding.count, 1,
            "binding {slot} is an array; the writer fills single descriptors only"
        );
        binding.kind
    }

    fn assert_complete(&self) {
        for binding in self.layout.bindings() {
            assert!(
                self.writes.contains_key(&binding.binding),
                "binding {} has no resource written",
                binding.binding
            );
        }
    }
}
