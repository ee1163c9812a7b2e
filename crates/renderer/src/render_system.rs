//! Draw submission for scene entities.

use std::sync::Arc;

use ash::vk;
use tracing::{info, trace};

use cadence_rhi::pipeline::check_push_constant_ranges;
use cadence_rhi::{GraphicsBackend, GraphicsPipelineDesc, RhiResult};
use cadence_scene::Entity;

use crate::descriptors::DescriptorSetLayout;
use crate::frame::FrameContext;
use crate::mesh::Mesh;
use crate::ubo::ObjectPushConstants;

/// Stages that read the per-object push-constant block.
pub const PUSH_CONSTANT_STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::from_raw(
    vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw(),
);

/// Set index the global uniform set is bound at.
pub const GLOBAL_SET_INDEX: u32 = 0;

/// Renders entities with one pipeline, one global set and per-object push constants.
pub struct RenderSystem<B: GraphicsBackend> {
    pipeline: B::Pipeline,
    pipeline_layout: B::PipelineLayout,
    backend: Arc<B>,
}

impl<B: GraphicsBackend> RenderSystem<B> {
    /// Builds the pipeline layout and the graphics pipeline for `chain`.
    ///
    /// The pipeline only depends on the chain's formats, so it survives any
    /// rebuild that passes the compatibility check.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::PipelineError`](cadence_rhi::RhiError::PipelineError)
    /// if [`ObjectPushConstants`] does not fit the device's push-constant
    /// limit, and any pipeline creation error.
    pub fn new(
        backend: Arc<B>,
        chain: &B::Chain,
        global_layout: &DescriptorSetLayout<B>,
        desc: &GraphicsPipelineDesc,
    ) -> RhiResult<Self> {
        let push_constant_ranges = [vk::PushConstantRange {
            stage_flags: PUSH_CONSTANT_STAGES,
            offset: 0,
            size: ObjectPushConstants::SIZE as u32,
        }];
        check_push_constant_ranges(&push_constant_ranges, backend.max_push_constants_size())?;

        let pipeline_layout =
            backend.create_pipeline_layout(&[global_layout.raw()], &push_constant_ranges)?;
        let pipeline = backend.create_graphics_pipeline(desc, &pipeline_layout, chain)?;

        info!(
            "Render system ready ({} byte push constants)",
            ObjectPushConstants::SIZE
        );

        Ok(Self {
            pipeline,
            pipeline_layout,
            backend,
        })
    }

    /// Records draws for `entities` in order into the frame's command buffer.
    ///
    /// Entities without geometry are skipped. Must be called between
    /// `begin_render_pass` and `end_render_pass`.
    pub fn render(&self, frame: &FrameContext<'_, B>, entities: &[Entity<Mesh<B>>]) {
        let cmd = frame.command_buffer;
        self.backend.cmd_bind_pipeline(cmd, &self.pipeline);
        self.backend.cmd_bind_descriptor_set(
            cmd,
            &self.pipeline_layout,
            GLOBAL_SET_INDEX,
            frame.global_set,
        );

        for entity in entities {
            let Some(mesh) = &entity.geometry else {
                trace!("Skipping entity {} without geometry", entity.id());
                continue;
            };

            let push = ObjectPushConstants::new(&entity.transform, entity.color);
            self.backend.cmd_push_constants(
                cmd,
                &self.pipeline_layout,
                PUSH_CONSTANT_STAGES,
                0,
                bytemuck::bytes_of(&push),
            );
            mesh.bind(cmd);
            mesh.draw(cmd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, MockCommand};
    use cadence_rhi::{DescriptorKind, RhiError, Vertex};
    use cadence_scene::{Camera, EntityFactory, Transform};
    use glam::{Vec2, Vec3};

    struct Fixture {
        backend: Arc<MockBackend>,
        chain: <MockBackend as GraphicsBackend>::Chain,
        layout: DescriptorSetLayout<MockBackend>,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(MockBackend::new());
        let chain = backend
            .create_chain(vk::Extent2D { width: 800, height: 600 }, 2, None)
            .unwrap();
        let layout = DescriptorSetLayout::builder(&backend)
            .add_binding(0, DescriptorKind::UniformBuffer, PUSH_CONSTANT_STAGES)
            .build()
            .unwrap();
        Fixture {
            backend,
            chain,
            layout,
        }
    }

    fn desc() -> GraphicsPipelineDesc {
        GraphicsPipelineDesc::new("default.vert.spv", "default.frag.spv")
    }

    fn mesh(backend: &Arc<MockBackend>, indices: &[u32]) -> Arc<Mesh<MockBackend>> {
        let vertices: Vec<Vertex> = [Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::ONE]
            .into_iter()
            .map(|p| Vertex::new(p, Vec3::ONE, Vec3::Z, Vec2::ZERO))
            .collect();
        Arc::new(Mesh::new(backend.clone(), &vertices, indices).unwrap())
    }

    #[test]
    fn test_layout_carries_push_constant_range() {
        let f = fixture();
        let system = RenderSystem::new(f.backend.clone(), &f.chain, &f.layout, &desc()).unwrap();

        assert_eq!(system.pipeline_layout.set_layouts, 1);
        let range = system.pipeline_layout.push_constant_ranges[0];
        assert_eq!(range.size, 128);
        assert_eq!(range.stage_flags, PUSH_CONSTANT_STAGES);
    }

    #[test]
    fn test_push_constants_over_device_limit_is_fatal() {
        let f = fixture();
        f.backend.set_max_push_constants_size(64);

        let result = RenderSystem::new(f.backend.clone(), &f.chain, &f.layout, &desc());
        assert!(matches!(result, Err(RhiError::PipelineError(_))));
    }

    #[test]
    fn test_render_draws_each_entity() {
        let f = fixture();
        let system = RenderSystem::new(f.backend.clone(), &f.chain, &f.layout, &desc()).unwrap();
        let plain = mesh(&f.backend, &[]);
        let indexed = mesh(&f.backend, &[0, 1, 2, 2, 1, 3]);

        let mut factory = EntityFactory::new();
        let moved = Transform::default().with_translation(Vec3::new(1.0, 0.0, 0.0));
        let entities = vec![
            factory.create().with_geometry(plain.clone()),
            factory.create(),
            factory
                .create()
                .with_geometry(indexed.clone())
                .with_color(Vec3::Y)
                .with_transform(moved),
            factory.create().with_geometry(plain.clone()),
        ];

        let camera = Camera::new();
        let frame = FrameContext {
            frame_index: 0,
            frame_time: 0.016,
            command_buffer: 9,
            camera: &camera,
            global_set: 42,
        };

        f.backend.clear_log();
        system.render(&frame, &entities);
        let log = f.backend.log();

        assert!(matches!(log[0], MockCommand::BindPipeline(_)));
        assert_eq!(
            log[1],
            MockCommand::BindDescriptorSet {
                set_index: 0,
                set: 42
            }
        );

        let pushes: Vec<&Vec<u8>> = log
            .iter()
            .filter_map(|c| match c {
                MockCommand::PushConstants { data, stages, .. } => {
                    assert_eq!(*stages, PUSH_CONSTANT_STAGES);
                    Some(data)
                }
                _ => None,
            })
            .collect();
        assert_eq!(pushes.len(), 3);
        assert_eq!(
            pushes[1].as_slice(),
            bytemuck::bytes_of(&ObjectPushConstants::new(&moved, Vec3::Y))
        );

        let draws: Vec<&MockCommand> = log
            .iter()
            .filter(|c| matches!(c, MockCommand::Draw(_) | MockCommand::DrawIndexed(_)))
            .collect();
        assert_eq!(
            draws,
            vec![
                &MockCommand::Draw(4),
                &MockCommand::DrawIndexed(6),
                &MockCommand::Draw(4)
            ]
        );
    }

    #[test]
    fn test_render_without_entities_only_binds() {
        let f = fixture();
        let system = RenderSystem::new(f.backend.clone(), &f.chain, &f.layout, &desc()).unwrap();
        let camera = Camera::new();
        let frame = FrameContext {
            frame_index: 1,
            frame_time: 0.0,
            command_buffer: 3,
            camera: &camera,
            global_set: 7,
        };

        f.backend.clear_log();
        system.render(&frame, &[]);
        assert_eq!(f.backend.log().len(), 2);
    }
}
