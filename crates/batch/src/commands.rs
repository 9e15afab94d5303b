use glam::IVec3;

use crate::BatchError;
use crate::buffers::GrowableBuffer;

/// One draw of an index range under a world position and yaw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCommand {
    pub position: IVec3,
    pub yaw: i32,
    /// First index in the shared index stream.
    pub offset: u32,
    /// Number of indices; zero marks an entry merged away by [`DrawCommands::reduce`].
    pub count: u32,
}

impl DrawCommand {
    fn continues(&self, next: &DrawCommand) -> bool {
        self.position == next.position
            && self.yaw == next.yaw
            && self.end() == Some(next.offset)
            && next.end().is_some()
    }

    /// One past the last index, or `None` if the range overflows `u32`.
    pub fn end(&self) -> Option<u32> {
        self.offset.checked_add(self.count)
    }
}

/// Per-frame list of draw commands.
#[derive(Debug, Clone, Default)]
pub struct DrawCommands {
    commands: GrowableBuffer<DrawCommand>,
}

impl DrawCommands {
    pub fn with_capacity(capacity: usize) -> Result<Self, BatchError> {
        Ok(Self {
            commands: GrowableBuffer::with_capacity(capacity)?,
        })
    }

    /// Append a command; empty ranges are dropped. Ranges ending past
    /// `u32::MAX` are rejected.
    pub fn add_command(
        &mut self,
        position: IVec3,
        yaw: i32,
        offset: u32,
        count: u32,
    ) -> Result<(), BatchError> {
        if count == 0 {
            return Ok(());
        }
        if offset.checked_add(count).is_none() {
            return Err(BatchError::RangeOutOfBounds {
                start: offset as usize,
                end: (offset as usize).saturating_add(count as usize),
                len: u32::MAX as usize,
            });
        }
        self.commands.push(DrawCommand {
            position,
            yaw,
            offset,
            count,
        })
    }

    /// Merge forward runs of same-transform commands with contiguous ranges.
    ///
    /// For each live entry `i`, following entries are absorbed while they
    /// share position and yaw and start where `i` currently ends. The first
    /// mismatch stops the scan for `i`. Absorbed entries keep their slot with
    /// `count == 0`.
    pub fn reduce(&mut self) {
        let commands = self.commands.as_mut_slice();
        let len = commands.len();
        let mut merged = 0usize;
        for i in 0..len {
            if commands[i].count == 0 {
                continue;
            }
            for j in i + 1..len {
                if commands[i].continues(&commands[j]) {
                    commands[i].count += commands[j].count;
                    commands[j].count = 0;
                    merged += 1;
                } else {
                    break;
                }
            }
        }
        tracing::trace!(commands = len, merged, "draw commands reduced");
    }

    pub fn reset(&mut self) {
        self.commands.clear();
    }

    /// Every slot, including entries zeroed by reduction.
    pub fn as_slice(&self) -> &[DrawCommand] {
        self.commands.as_slice()
    }

    /// Entries with a non-empty range.
    pub fn active(&self) -> impl Iterator<Item = &DrawCommand> {
        self.commands.iter().filter(|c| c.count > 0)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.commands.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(offset: u32, count: u32) -> (IVec3, i32, u32, u32) {
        (IVec3::new(10, -20, 30), 512, offset, count)
    }

    fn build(entries: &[(IVec3, i32, u32, u32)]) -> DrawCommands {
        let mut commands = DrawCommands::with_capacity(4).unwrap();
        for &(p, yaw, offset, count) in entries {
            commands.add_command(p, yaw, offset, count).unwrap();
        }
        commands
    }

    #[test]
    fn reduce_merges_contiguous_run() {
        let mut commands = build(&[cmd(0, 5), cmd(5, 3), cmd(8, 2)]);
        commands.reduce();

        let counts: Vec<u32> = commands.as_slice().iter().map(|c| c.count).collect();
        assert_eq!(counts, vec![10, 0, 0]);
        let active: Vec<_> = commands.active().collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].offset, 0);
        assert_eq!(active[0].count, 10);
        assert_eq!(active[0].yaw, 512);
    }

    #[test]
    fn zero_count_dropped_on_insert() {
        let commands = build(&[cmd(0, 0), cmd(0, 3), cmd(3, 0)]);
        assert_eq!(commands.len(), 1);
    }

    #[test]
    fn reduce_stops_at_first_mismatch() {
        let other = (IVec3::new(0, 0, 0), 512, 8, 2);
        let mut commands = build(&[cmd(0, 5), cmd(5, 3), other, cmd(10, 4)]);
        commands.reduce();
        let counts: Vec<u32> = commands.as_slice().iter().map(|c| c.count).collect();
        // third entry breaks the chain; the fourth is not contiguous with it
        assert_eq!(counts, vec![8, 0, 2, 4]);
    }

    #[test]
    fn reduce_requires_contiguous_offsets() {
        let mut commands = build(&[cmd(0, 5), cmd(6, 3), cmd(9, 1)]);
        commands.reduce();
        let counts: Vec<u32> = commands.as_slice().iter().map(|c| c.count).collect();
        assert_eq!(counts, vec![5, 4, 0]);
    }

    #[test]
    fn reduce_respects_yaw() {
        let turned = (IVec3::new(10, -20, 30), 0, 5, 3);
        let mut commands = build(&[cmd(0, 5), turned]);
        commands.reduce();
        assert_eq!(commands.active().count(), 2);
    }

    #[test]
    fn reduce_preserves_covered_indices() {
        let entries = [cmd(0, 5), cmd(5, 3), cmd(8, 2), cmd(20, 6), cmd(26, 1)];
        let mut commands = build(&entries);
        let covered = |c: &DrawCommands| -> Vec<u32> {
            c.active().flat_map(|d| d.offset..d.end().unwrap()).collect()
        };
        let before = covered(&commands);
        commands.reduce();
        assert_eq!(covered(&commands), before);
        assert_eq!(commands.active().count(), 2);
    }

    #[test]
    fn many_commands_grow_in_order() {
        let mut commands = DrawCommands::with_capacity(1024).unwrap();
        for i in 0..10_000u32 {
            commands
                .add_command(IVec3::new(i as i32, 0, 0), 0, i * 3, 3)
                .unwrap();
        }
        assert_eq!(commands.len(), 10_000);
        assert!(
            commands
                .as_slice()
                .iter()
                .enumerate()
                .all(|(i, c)| c.position.x == i as i32 && c.offset == i as u32 * 3)
        );
    }

    #[test]
    fn ranges_near_u32_max_do_not_overflow() {
        let mut commands = build(&[cmd(u32::MAX - 10, 5), cmd(u32::MAX - 5, 5)]);
        assert!(matches!(
            commands.add_command(IVec3::ZERO, 0, u32::MAX - 2, 5),
            Err(BatchError::RangeOutOfBounds { .. })
        ));
        commands.reduce();
        let active: Vec<_> = commands.active().collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].count, 10);
        assert_eq!(active[0].end(), Some(u32::MAX));

        let last = DrawCommand {
            position: IVec3::ZERO,
            yaw: 0,
            offset: u32::MAX - 3,
            count: 3,
        };
        let wrapping = DrawCommand {
            offset: u32::MAX,
            count: 1,
            ..last
        };
        assert_eq!(wrapping.end(), None);
        assert!(!last.continues(&wrapping));
        let huge = DrawCommand {
            offset: 10,
            count: u32::MAX,
            ..last
        };
        assert!(!huge.continues(&last));
    }

    #[test]
    fn reset_clears_for_next_frame() {
        let mut commands = build(&[cmd(0, 5)]);
        commands.reset();
        assert!(commands.is_empty());
        assert_eq!(commands.active().count(), 0);
    }
}
