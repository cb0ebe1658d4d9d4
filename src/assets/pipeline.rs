use super::{AssetError, AssetKind, ImageDecoder, PanoramaPrecision, Texture2D};
use crate::environment::{EnvironmentMap, EnvironmentMapper};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Source locations of the four required assets.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AssetSources {
    pub panorama: PathBuf,
    pub color_map: PathBuf,
    pub bump_map: PathBuf,
    pub specular_map: PathBuf,
}

impl Default for AssetSources {
    fn default() -> Self {
        Self {
            panorama: PathBuf::from("public/old_room_2k.hdr"),
            color_map: PathBuf::from("public/earthmap.jpg"),
            bump_map: PathBuf::from("public/earthbump.jpg"),
            specular_map: PathBuf::from("public/earthspec.jpg"),
        }
    }
}

impl AssetSources {
    pub fn path(&self, kind: AssetKind) -> &Path {
        match kind {
            AssetKind::Panorama => &self.panorama,
            AssetKind::ColorMap => &self.color_map,
            AssetKind::BumpMap => &self.bump_map,
            AssetKind::SpecularMap => &self.specular_map,
        }
    }

    /// Resolve relative paths against `base`.
    pub fn resolved_against(&self, base: &Path) -> Self {
        let resolve = |path: &PathBuf| {
            if path.is_absolute() {
                path.clone()
            } else {
                base.join(path)
            }
        };
        Self {
            panorama: resolve(&self.panorama),
            color_map: resolve(&self.color_map),
            bump_map: resolve(&self.bump_map),
            specular_map: resolve(&self.specular_map),
        }
    }
}

/// Completion of one background load, delivered on the control thread.
#[derive(Debug)]
pub enum AssetEvent {
    Texture {
        kind: AssetKind,
        result: Result<Texture2D, AssetError>,
    },
    Environment(Result<Arc<EnvironmentMap>, AssetError>),
}

impl AssetEvent {
    pub fn kind(&self) -> AssetKind {
        match self {
            AssetEvent::Texture { kind, .. } => *kind,
            AssetEvent::Environment(_) => AssetKind::Panorama,
        }
    }
}

/// Runs the four asset loads concurrently and hands their results back
/// through `poll`. Dropping the pipeline cancels whatever is still running.
pub struct AssetPipeline {
    runtime: Option<Runtime>,
    tasks: Vec<JoinHandle<()>>,
    events: mpsc::UnboundedReceiver<AssetEvent>,
    outstanding: usize,
}

impl AssetPipeline {
    pub fn start(
        sources: &AssetSources,
        decoder: Arc<dyn ImageDecoder>,
        mapper: EnvironmentMapper,
    ) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("asset-loader")
            .build()?;
        let (sender, events) = mpsc::unbounded_channel();
        let mut tasks = Vec::with_capacity(AssetKind::ALL.len());

        {
            let sender = sender.clone();
            let decoder = Arc::clone(&decoder);
            let path = sources.panorama.clone();
            tasks.push(runtime.spawn(async move {
                let result = tokio::task::spawn_blocking(move || {
                    load_environment(decoder.as_ref(), &path, &mapper)
                })
                .await
                .unwrap_or(Err(AssetError::Interrupted {
                    kind: AssetKind::Panorama,
                }));
                let _ = sender.send(AssetEvent::Environment(result));
            }));
        }

        for kind in [
            AssetKind::ColorMap,
            AssetKind::BumpMap,
            AssetKind::SpecularMap,
        ] {
            let sender = sender.clone();
            let decoder = Arc::clone(&decoder);
            let path = sources.path(kind).to_path_buf();
            tasks.push(runtime.spawn(async move {
                let result = tokio::task::spawn_blocking(move || {
                    load_texture(decoder.as_ref(), kind, &path)
                })
                .await
                .unwrap_or(Err(AssetError::Interrupted { kind }));
                let _ = sender.send(AssetEvent::Texture { kind, result });
            }));
        }

        log::info!("Started {} asset loads", tasks.len());
        Ok(Self {
            runtime: Some(runtime),
            outstanding: tasks.len(),
            tasks,
            events,
        })
    }

    /// Drain completed loads without blocking.
    pub fn poll(&mut self) -> Vec<AssetEvent> {
        let mut completed = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            self.outstanding = self.outstanding.saturating_sub(1);
            completed.push(event);
        }
        completed
    }

    pub fn is_finished(&self) -> bool {
        self.outstanding == 0
    }

    /// Abort loads that have not delivered yet. Their results are discarded.
    pub fn cancel(&mut self) {
        if self.outstanding > 0 {
            log::info!("Cancelling {} pending asset loads", self.outstanding);
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.events.close();
        while self.events.try_recv().is_ok() {}
        self.outstanding = 0;
    }
}

impl Drop for AssetPipeline {
    fn drop(&mut self) {
        self.cancel();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn load_texture(
    decoder: &dyn ImageDecoder,
    kind: AssetKind,
    path: &Path,
) -> Result<Texture2D, AssetError> {
    let started = Instant::now();
    let texture = decoder
        .load_texture(path)
        .map_err(|source| AssetError::Load {
            kind,
            path: path.display().to_string(),
            source,
        })?;
    log::debug!(
        "Decoded {} {}x{} in {:.1} ms",
        kind,
        texture.width(),
        texture.height(),
        started.elapsed().as_secs_f64() * 1000.0
    );
    Ok(texture)
}

fn load_environment(
    decoder: &dyn ImageDecoder,
    path: &Path,
    mapper: &EnvironmentMapper,
) -> Result<Arc<EnvironmentMap>, AssetError> {
    let panorama = decoder
        .load_panorama(path, PanoramaPrecision::Float)
        .map_err(|source| AssetError::Load {
            kind: AssetKind::Panorama,
            path: path.display().to_string(),
            source,
        })?;
    let map = mapper
        .derive(&panorama)
        .map_err(|source| AssetError::Environment {
            path: path.display().to_string(),
            source,
        })?;
    Ok(Arc::new(map))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::assets::{DecodeError, PanoramicImage};
    use crate::environment::PrefilterSettings;
    use glam::Vec3;
    use std::collections::HashSet;
    use std::time::Duration;

    /// In-memory decoder: every path decodes unless its file name is listed
    /// as failing.
    #[derive(Default)]
    pub(crate) struct FakeDecoder {
        pub failing: HashSet<String>,
        pub low_precision: bool,
    }

    impl FakeDecoder {
        pub fn failing(names: &[&str]) -> Self {
            Self {
                failing: names.iter().map(|name| name.to_string()).collect(),
                low_precision: false,
            }
        }

        fn check(&self, path: &Path) -> Result<(), DecodeError> {
            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default();
            if self.failing.contains(name) {
                return Err(DecodeError::Read {
                    path: path.display().to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "simulated"),
                });
            }
            Ok(())
        }
    }

    impl ImageDecoder for FakeDecoder {
        fn load_texture(&self, path: &Path) -> Result<Texture2D, DecodeError> {
            self.check(path)?;
            Texture2D::new(2, 2, vec![128; 16])
        }

        fn load_panorama(
            &self,
            path: &Path,
            precision: PanoramaPrecision,
        ) -> Result<PanoramicImage, DecodeError> {
            self.check(path)?;
            let precision = if self.low_precision {
                PanoramaPrecision::Standard
            } else {
                precision
            };
            PanoramicImage::new(8, 4, precision, vec![Vec3::splat(0.5); 32])
        }
    }

    pub(crate) fn tiny_mapper() -> EnvironmentMapper {
        EnvironmentMapper::new(PrefilterSettings {
            specular_size: 4,
            specular_levels: 2,
            specular_samples: 4,
            irradiance_size: 2,
            irradiance_samples: 4,
        })
    }

    fn collect_all(pipeline: &mut AssetPipeline) -> Vec<AssetEvent> {
        let mut events = Vec::new();
        for _ in 0..500 {
            events.extend(pipeline.poll());
            if pipeline.is_finished() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        events
    }

    #[test]
    fn delivers_one_event_per_asset() {
        let mut pipeline = AssetPipeline::start(
            &AssetSources::default(),
            Arc::new(FakeDecoder::default()),
            tiny_mapper(),
        )
        .expect("start");
        let events = collect_all(&mut pipeline);
        assert!(pipeline.is_finished());
        let kinds: HashSet<AssetKind> = events.iter().map(AssetEvent::kind).collect();
        assert_eq!(kinds.len(), 4);
        assert!(events.iter().all(|event| match event {
            AssetEvent::Texture { result, .. } => result.is_ok(),
            AssetEvent::Environment(result) => result.is_ok(),
        }));
    }

    #[test]
    fn one_failure_does_not_abort_the_others() {
        let mut pipeline = AssetPipeline::start(
            &AssetSources::default(),
            Arc::new(FakeDecoder::failing(&["earthbump.jpg"])),
            tiny_mapper(),
        )
        .expect("start");
        let events = collect_all(&mut pipeline);
        assert_eq!(events.len(), 4);
        let failures: Vec<AssetKind> = events
            .iter()
            .filter_map(|event| match event {
                AssetEvent::Texture {
                    kind,
                    result: Err(_),
                } => Some(*kind),
                AssetEvent::Environment(Err(err)) => Some(err.kind()),
                _ => None,
            })
            .collect();
        assert_eq!(failures, vec![AssetKind::BumpMap]);
    }

    #[test]
    fn environment_failure_is_reported_as_derivation_error() {
        let decoder = FakeDecoder {
            low_precision: true,
            ..FakeDecoder::default()
        };
        let mut pipeline =
            AssetPipeline::start(&AssetSources::default(), Arc::new(decoder), tiny_mapper())
                .expect("start");
        let events = collect_all(&mut pipeline);
        let environment = events
            .into_iter()
            .find_map(|event| match event {
                AssetEvent::Environment(result) => Some(result),
                _ => None,
            })
            .expect("environment event");
        assert!(matches!(environment, Err(AssetError::Environment { .. })));
    }

    #[test]
    fn cancel_discards_pending_results() {
        let mut pipeline = AssetPipeline::start(
            &AssetSources::default(),
            Arc::new(FakeDecoder::default()),
            tiny_mapper(),
        )
        .expect("start");
        pipeline.cancel();
        assert!(pipeline.is_finished());
        std::thread::sleep(Duration::from_millis(50));
        assert!(pipeline.poll().is_empty());
    }

    #[test]
    fn resolves_relative_sources() {
        let sources = AssetSources {
            panorama: PathBuf::from("/abs/room.hdr"),
            ..AssetSources::default()
        };
        let resolved = sources.resolved_against(Path::new("/data"));
        assert_eq!(resolved.panorama, PathBuf::from("/abs/room.hdr"));
        assert_eq!(resolved.color_map, PathBuf::from("/data/public/earthmap.jpg"));
    }
}
