use std::sync::atomic::{AtomicU32, Ordering};

use crossbeam_channel::unbounded;
use isoraster_common::{PixelSurface, Viewport};

use crate::RasterError;
use crate::backend::{PassStats, RasterBackend, Tables, blend_alpha_queue, draw_command};
use crate::command::{TriangleCommand, TriangleKind};
use crate::packed::PackedRecord;
use crate::queue::TriangleQueue;
use crate::sink::{DepthSink, ResolveSink};

/// Triangles handed to a worker at a time.
const CHUNK: usize = 64;

/// A run of records from one kind's array.
#[derive(Debug, Clone, Copy)]
struct WorkItem {
    kind: TriangleKind,
    start: usize,
    end: usize,
}

fn work_items(queue: &TriangleQueue) -> Vec<WorkItem> {
    let mut items = Vec::new();
    for kind in [
        TriangleKind::Flat,
        TriangleKind::Gouraud,
        TriangleKind::Textured,
    ] {
        let len = queue.count(kind);
        for start in (0..len).step_by(CHUNK) {
            items.push(WorkItem {
                kind,
                start,
                end: (start + CHUNK).min(len),
            });
        }
    }
    items
}

fn each_in<R: PackedRecord>(records: &[R], f: &mut impl FnMut(u32, TriangleCommand)) {
    for record in records {
        f(record.index(), record.decode());
    }
}

fn for_each_command(
    queue: &TriangleQueue,
    item: WorkItem,
    mut f: impl FnMut(u32, TriangleCommand),
) {
    let range = item.start..item.end;
    match item.kind {
        TriangleKind::Flat => each_in(&queue.flat()[range], &mut f),
        TriangleKind::Gouraud => each_in(&queue.gouraud()[range], &mut f),
        TriangleKind::Textured => each_in(&queue.textured()[range], &mut f),
        TriangleKind::Alpha => each_in(&queue.alpha()[range], &mut f),
    }
}

/// Two-pass data-parallel rasterization.
///
/// Pass one records, per pixel, the highest `index + 1` of any opaque
/// triangle covering it. Pass two writes a triangle's color only where it
/// won pass one. The result equals painter order without ordering the work.
/// Both passes complete before the surface is touched.
#[derive(Debug)]
pub struct ParallelBackend {
    workers: usize,
    depth: Vec<AtomicU32>,
    color: Vec<AtomicU32>,
}

impl ParallelBackend {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            depth: Vec::new(),
            color: Vec::new(),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    fn ensure_buffers(&mut self, len: usize) -> Result<(), RasterError> {
        if self.depth.len() != len {
            for buffer in [&mut self.depth, &mut self.color] {
                buffer.clear();
                buffer.shrink_to_fit();
                buffer.try_reserve_exact(len)?;
                buffer.resize_with(len, || AtomicU32::new(0));
            }
            tracing::debug!(pixels = len, "parallel depth buffers allocated");
        } else {
            for d in &mut self.depth {
                *d.get_mut() = 0;
            }
        }
        Ok(())
    }

    /// Run `job` over every work item on the worker pool. Returns the
    /// number of commands `job` rejected.
    fn run_pass<F>(
        &self,
        queue: &TriangleQueue,
        items: &[WorkItem],
        job: F,
    ) -> Result<usize, RasterError>
    where
        F: Fn(&TriangleCommand, u32) -> bool + Sync,
    {
        let (tx, rx) = unbounded::<WorkItem>();
        for item in items {
            tx.send(*item).map_err(|_| RasterError::WorkerDisconnected)?;
        }
        drop(tx);

        let workers = self.workers.min(items.len()).max(1);
        let job = &job;
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    let rx = rx.clone();
                    scope.spawn(move || {
                        let mut rejected = 0usize;
                        for item in rx.iter() {
                            for_each_command(queue, item, |index, command| {
                                if !job(&command, index + 1) {
                                    rejected += 1;
                                }
                            });
                        }
                        rejected
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().map_err(|_| RasterError::WorkerPanicked))
                .sum()
        })
    }
}

impl Default for ParallelBackend {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(workers)
    }
}

impl RasterBackend for ParallelBackend {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn resize(&mut self, viewport: Viewport) -> Result<(), RasterError> {
        self.ensure_buffers(viewport.pixel_count())
    }

    fn rasterize(
        &mut self,
        queue: &TriangleQueue,
        tables: &Tables<'_>,
        surface: &mut PixelSurface,
    ) -> Result<PassStats, RasterError> {
        let viewport = surface.viewport();
        self.ensure_buffers(viewport.pixel_count())?;

        let items = work_items(queue);
        let mut stats = PassStats::default();
        if !items.is_empty() {
            let (depth, color) = (&self.depth, &self.color);
            stats.skipped = self.run_pass(queue, &items, |command, key| {
                draw_command(command, &viewport, tables, &mut DepthSink::new(depth, key))
            })?;
            self.run_pass(queue, &items, |command, key| {
                let mut sink = ResolveSink::new(depth, color, key);
                draw_command(command, &viewport, tables, &mut sink)
            })?;

            for ((px, d), c) in surface
                .pixels_mut()
                .iter_mut()
                .zip(&self.depth)
                .zip(&self.color)
            {
                if d.load(Ordering::Relaxed) != 0 {
                    *px = c.load(Ordering::Relaxed);
                }
            }
            tracing::trace!(
                workers = self.workers,
                items = items.len(),
                "parallel passes done"
            );
        }
        stats.opaque = queue.opaque_count() - stats.skipped;
        stats.alpha = blend_alpha_queue(queue, tables, surface);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SequentialBackend;
    use crate::command::{
        AlphaShape, AlphaTriangle, FlatTriangle, GouraudTriangle, TexturedTriangle,
    };
    use glam::IVec3;
    use isoraster_palette::{Palette, TextureAtlas, TextureSource};

    /// Deterministic overlapping geometry of every kind.
    fn scene_queue() -> TriangleQueue {
        let mut queue = TriangleQueue::new(16, 10_000).unwrap();
        let mut seed = 0x2545_f491u32;
        let mut next = |m: i32| {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            (seed % m as u32) as i32
        };
        for i in 0..600 {
            let x = [next(90) - 10, next(90) - 10, next(90) - 10];
            let y = [next(70) - 5, next(70) - 5, next(70) - 5];
            let command = match i % 4 {
                0 => TriangleCommand::Flat(FlatTriangle {
                    x,
                    y,
                    color: 0x100000 + i as u32,
                }),
                1 => TriangleCommand::Gouraud(GouraudTriangle {
                    x,
                    y,
                    colors: [next(65536), next(65536), next(65536)],
                }),
                2 => TriangleCommand::Textured(TexturedTriangle {
                    x,
                    y,
                    shades: [next(40), next(40), next(40)],
                    origin: IVec3::new(-200, -150, 600),
                    basis_b: IVec3::new(-200, 150, 600),
                    basis_c: IVec3::new(200, -150, 650),
                    texture_id: (i as u32 / 4) % 3,
                }),
                _ => TriangleCommand::Alpha(AlphaTriangle {
                    alpha: next(255) as u8,
                    shape: AlphaShape::Flat(FlatTriangle {
                        x,
                        y,
                        color: 0x00ff00,
                    }),
                }),
            };
            queue.push(&command).unwrap();
        }
        queue
    }

    fn atlas() -> TextureAtlas {
        let mut atlas = TextureAtlas::new(3, 0.9).unwrap();
        atlas
            .set_texture(0, TextureSource::checker(0xff8040, 0x2040ff, 8, false))
            .unwrap();
        atlas
            .set_texture(1, TextureSource::checker(0xffffff, 0, 16, true))
            .unwrap();
        atlas
    }

    #[test]
    fn matches_sequential_pixels() {
        let palette = Palette::new(0.9).unwrap();
        let atlas = atlas();
        let tables = Tables {
            palette: &palette,
            atlas: &atlas,
        };
        let queue = scene_queue();
        let viewport = Viewport::new(80, 60);

        let mut expected = PixelSurface::new(viewport).unwrap();
        let seq = SequentialBackend::new()
            .rasterize(&queue, &tables, &mut expected)
            .unwrap();

        for workers in [1, 3, 8] {
            let mut actual = PixelSurface::new(viewport).unwrap();
            let par = ParallelBackend::new(workers)
                .rasterize(&queue, &tables, &mut actual)
                .unwrap();
            assert_eq!(par, seq);
            assert_eq!(actual.digest(), expected.digest(), "workers = {workers}");
        }
    }

    #[test]
    fn empty_queue_leaves_surface() {
        let palette = Palette::new(0.9).unwrap();
        let atlas = atlas();
        let tables = Tables {
            palette: &palette,
            atlas: &atlas,
        };
        let queue = TriangleQueue::new(4, 4).unwrap();
        let mut surface = PixelSurface::new(Viewport::new(8, 8)).unwrap();
        surface.clear(0x123456);
        let stats = ParallelBackend::new(2)
            .rasterize(&queue, &tables, &mut surface)
            .unwrap();
        assert_eq!(stats, PassStats::default());
        assert_eq!(surface.count_not(0x123456), 0);
    }

    #[test]
    fn resize_reallocates_buffers() {
        let mut backend = ParallelBackend::new(2);
        backend.resize(Viewport::new(10, 10)).unwrap();
        assert_eq!(backend.depth.len(), 100);
        backend.resize(Viewport::new(4, 5)).unwrap();
        assert_eq!(backend.color.len(), 20);
    }
}
