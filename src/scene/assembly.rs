//! Join point between the background asset loads and the scene.
//!
//! Results arrive in any order. The sphere is inserted once every texture and
//! the environment map are present; a single failure aborts construction and
//! the scene keeps rendering without the sphere.

use super::{MaterialSettings, SceneGraph, SphereGeometry, SphereMaterial, SphereMesh};
use crate::assets::{AssetError, AssetEvent, AssetKind, Texture2D};
use crate::environment::EnvironmentMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyState {
    Pending,
    Ready,
    Aborted,
}

#[derive(Debug)]
pub struct SceneAssembly {
    geometry: SphereGeometry,
    material: MaterialSettings,
    color_map: Option<Texture2D>,
    bump_map: Option<Texture2D>,
    specular_map: Option<Texture2D>,
    environment: Option<Arc<EnvironmentMap>>,
    failures: Vec<AssetError>,
    state: AssemblyState,
}

impl SceneAssembly {
    pub fn new(geometry: SphereGeometry, material: MaterialSettings) -> Self {
        Self {
            geometry,
            material,
            color_map: None,
            bump_map: None,
            specular_map: None,
            environment: None,
            failures: Vec::new(),
            state: AssemblyState::Pending,
        }
    }

    pub fn state(&self) -> AssemblyState {
        self.state
    }

    #[cfg(test)]
    pub fn failures(&self) -> &[AssetError] {
        &self.failures
    }

    /// Assets still awaited while pending.
    pub fn missing(&self) -> Vec<AssetKind> {
        if self.state != AssemblyState::Pending {
            return Vec::new();
        }
        AssetKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                AssetKind::Panorama => self.environment.is_none(),
                AssetKind::ColorMap => self.color_map.is_none(),
                AssetKind::BumpMap => self.bump_map.is_none(),
                AssetKind::SpecularMap => self.specular_map.is_none(),
            })
            .collect()
    }

    pub fn accept(&mut self, event: AssetEvent, scene: &mut SceneGraph) -> AssemblyState {
        match event {
            AssetEvent::Texture {
                kind,
                result: Ok(texture),
            } => self.store_texture(kind, texture),
            AssetEvent::Environment(Ok(map)) => {
                if self.state == AssemblyState::Pending {
                    log::info!(
                        "Environment map ready ({} px, {} specular levels)",
                        map.specular().base_size(),
                        map.specular().levels().len()
                    );
                    self.environment = Some(map);
                }
            }
            AssetEvent::Texture { result: Err(err), .. } | AssetEvent::Environment(Err(err)) => {
                self.fail(err)
            }
        }

        if self.state == AssemblyState::Pending {
            self.try_ready(scene);
        }
        self.state
    }

    fn store_texture(&mut self, kind: AssetKind, texture: Texture2D) {
        if self.state != AssemblyState::Pending {
            log::debug!("Discarding {kind}: scene construction is no longer pending");
            return;
        }
        log::info!("Loaded {} ({}x{})", kind, texture.width(), texture.height());
        let slot = match kind {
            AssetKind::ColorMap => &mut self.color_map,
            AssetKind::BumpMap => &mut self.bump_map,
            AssetKind::SpecularMap => &mut self.specular_map,
            AssetKind::Panorama => {
                log::warn!("Ignoring panorama delivered as a plain texture");
                return;
            }
        };
        *slot = Some(texture);
    }

    fn fail(&mut self, err: AssetError) {
        log::error!("{err}");
        let kind = err.kind();
        self.failures.push(err);
        if self.state == AssemblyState::Pending {
            log::warn!("Scene construction aborted by {kind}; rendering continues without the sphere");
            self.state = AssemblyState::Aborted;
            self.color_map = None;
            self.bump_map = None;
            self.specular_map = None;
            self.environment = None;
        }
    }

    fn try_ready(&mut self, scene: &mut SceneGraph) {
        if self.color_map.is_none()
            || self.bump_map.is_none()
            || self.specular_map.is_none()
            || self.environment.is_none()
        {
            return;
        }
        let (Some(color_map), Some(bump_map), Some(roughness_map), Some(environment)) = (
            self.color_map.take(),
            self.bump_map.take(),
            self.specular_map.take(),
            self.environment.take(),
        ) else {
            return;
        };
        self.ready(
            scene,
            SphereMaterial {
                color_map,
                bump_map,
                roughness_map,
                environment,
                params: self.material,
            },
        );
    }

    fn ready(&mut self, scene: &mut SceneGraph, material: SphereMaterial) {
        let mesh = SphereMesh::new(self.geometry, material);
        let triangles = mesh.data().indices.len() / 3;
        match scene.insert_mesh(mesh) {
            Ok(()) => log::info!("Sphere added to scene ({triangles} triangles)"),
            Err(err) => log::warn!("{err}"),
        }
        self.state = AssemblyState::Ready;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::pipeline::tests::tiny_mapper;
    use crate::assets::{DecodeError, PanoramaPrecision, PanoramicImage};
    use crate::render::{CameraRig, CameraSettings, ViewportState};
    use crate::scene::DirectionalLight;
    use glam::Vec3;

    fn scene() -> SceneGraph {
        let camera = CameraRig::new(&CameraSettings::default(), &ViewportState::new(640, 480));
        SceneGraph::new(DirectionalLight::default(), camera)
    }

    fn texture(kind: AssetKind) -> AssetEvent {
        AssetEvent::Texture {
            kind,
            result: Texture2D::new(1, 1, vec![255; 4]).map_err(|source| AssetError::Load {
                kind,
                path: "memory".into(),
                source,
            }),
        }
    }

    fn environment() -> AssetEvent {
        let panorama =
            PanoramicImage::new(4, 2, PanoramaPrecision::Float, vec![Vec3::ONE; 8]).unwrap();
        AssetEvent::Environment(Ok(Arc::new(tiny_mapper().derive(&panorama).unwrap())))
    }

    fn failed(kind: AssetKind) -> AssetEvent {
        let err = AssetError::Load {
            kind,
            path: format!("{kind}.jpg"),
            source: DecodeError::Empty,
        };
        match kind {
            AssetKind::Panorama => AssetEvent::Environment(Err(err)),
            _ => AssetEvent::Texture {
                kind,
                result: Err(err),
            },
        }
    }

    fn assembly() -> SceneAssembly {
        SceneAssembly::new(SphereGeometry::default(), MaterialSettings::default())
    }

    #[test]
    fn inserts_mesh_once_all_assets_arrive_in_any_order() {
        let mut scene = scene();
        let mut assembly = assembly();
        let events = vec![
            texture(AssetKind::SpecularMap),
            environment(),
            texture(AssetKind::ColorMap),
        ];
        for event in events {
            assert_eq!(assembly.accept(event, &mut scene), AssemblyState::Pending);
            assert!(scene.mesh().is_none());
        }
        assert_eq!(assembly.missing(), vec![AssetKind::BumpMap]);
        assert_eq!(
            assembly.accept(texture(AssetKind::BumpMap), &mut scene),
            AssemblyState::Ready
        );

        let mesh = scene.mesh().expect("sphere inserted");
        assert_eq!(scene.object_count(), 3);
        assert_eq!(mesh.material().params.env_map_intensity, 0.3);
        assert_eq!(mesh.material().params.bump_scale, 0.6);
        assert_eq!(mesh.geometry().radius, 5.0);
        assert_eq!(mesh.geometry().width_segments, 64);
        assert_eq!(mesh.geometry().height_segments, 32);
    }

    #[test]
    fn partial_success_never_inserts() {
        let mut scene = scene();
        let mut assembly = assembly();
        assembly.accept(texture(AssetKind::ColorMap), &mut scene);
        assembly.accept(texture(AssetKind::BumpMap), &mut scene);
        assembly.accept(environment(), &mut scene);
        let state = assembly.accept(failed(AssetKind::SpecularMap), &mut scene);
        assert_eq!(state, AssemblyState::Aborted);
        assert!(scene.mesh().is_none());
        assert!(assembly.missing().is_empty());
    }

    #[test]
    fn failures_are_recorded_per_asset() {
        let mut scene = scene();
        let mut assembly = assembly();
        assembly.accept(failed(AssetKind::Panorama), &mut scene);
        assembly.accept(texture(AssetKind::ColorMap), &mut scene);
        assembly.accept(failed(AssetKind::BumpMap), &mut scene);
        assembly.accept(texture(AssetKind::SpecularMap), &mut scene);

        let kinds: Vec<AssetKind> = assembly.failures().iter().map(AssetError::kind).collect();
        assert_eq!(kinds, vec![AssetKind::Panorama, AssetKind::BumpMap]);
        assert_eq!(assembly.state(), AssemblyState::Aborted);
        assert!(scene.mesh().is_none());
    }

    #[test]
    fn late_events_after_ready_are_ignored() {
        let mut scene = scene();
        let mut assembly = assembly();
        for event in [
            texture(AssetKind::ColorMap),
            texture(AssetKind::BumpMap),
            texture(AssetKind::SpecularMap),
            environment(),
        ] {
            assembly.accept(event, &mut scene);
        }
        assert_eq!(assembly.state(), AssemblyState::Ready);
        assert_eq!(
            assembly.accept(texture(AssetKind::ColorMap), &mut scene),
            AssemblyState::Ready
        );
        assert_eq!(scene.object_count(), 3);
    }
}
