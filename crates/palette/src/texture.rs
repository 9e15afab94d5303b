use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::PaletteError;
use crate::palette::{adjust_brightness, validate_brightness};

/// Texture edge length in texels.
pub const TEXTURE_SIZE: usize = 128;
/// Texels in one unshaded texture.
pub const TEXTURE_TEXELS: usize = TEXTURE_SIZE * TEXTURE_SIZE;
/// Pre-shaded copies stored per layer.
pub const SHADE_BANDS: usize = 4;
/// Texels in one atlas layer (all shade bands).
pub const LAYER_TEXELS: usize = TEXTURE_TEXELS * SHADE_BANDS;

/// Unshaded source texels for one texture, `0xRRGGBB` row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureSource {
    pub texels: Vec<u32>,
    /// When set, texels equal to zero are not drawn.
    pub translucent: bool,
}

impl TextureSource {
    pub fn new(texels: Vec<u32>, translucent: bool) -> Result<Self, PaletteError> {
        if texels.len() != TEXTURE_TEXELS {
            return Err(PaletteError::TexelCount {
                expected: TEXTURE_TEXELS,
                actual: texels.len(),
            });
        }
        Ok(Self {
            texels,
            translucent,
        })
    }

    pub fn solid(rgb: u32) -> Self {
        Self {
            texels: vec![rgb; TEXTURE_TEXELS],
            translucent: false,
        }
    }

    /// Two-color checkerboard with square cells of `cell` texels.
    pub fn checker(a: u32, b: u32, cell: usize, translucent: bool) -> Self {
        let cell = cell.max(1);
        let texels = (0..TEXTURE_TEXELS)
            .map(|i| {
                let (x, y) = (i % TEXTURE_SIZE, i / TEXTURE_SIZE);
                if (x / cell + y / cell) % 2 == 0 { a } else { b }
            })
            .collect();
        Self {
            texels,
            translucent,
        }
    }
}

/// One atlas layer: four shade bands of a brightness-adjusted texture.
///
/// Band `k` lives at `k * TEXTURE_TEXELS` and holds:
/// - k = 0: `rgb & 0xf8f8ff`
/// - k = 1: `(rgb - (rgb >> 3)) & 0xf8f8ff`
/// - k = 2: `(rgb - (rgb >> 2)) & 0xf8f8ff`
/// - k = 3: `(rgb - (rgb >> 2) - (rgb >> 3)) & 0xf8f8ff`
#[derive(Debug, Clone)]
pub struct TextureLayer {
    texels: Vec<u32>,
    translucent: bool,
}

impl TextureLayer {
    fn empty() -> Self {
        Self {
            texels: vec![0; LAYER_TEXELS],
            translucent: false,
        }
    }

    fn build(source: &TextureSource, brightness: f64) -> Self {
        let mut texels = vec![0; LAYER_TEXELS];
        for (i, &src) in source.texels.iter().enumerate().take(TEXTURE_TEXELS) {
            let rgb = adjust_brightness(src, brightness);
            texels[i] = rgb & 0xf8f8ff;
            texels[i + TEXTURE_TEXELS] = (rgb - (rgb >> 3)) & 0xf8f8ff;
            texels[i + TEXTURE_TEXELS * 2] = (rgb - (rgb >> 2)) & 0xf8f8ff;
            texels[i + TEXTURE_TEXELS * 3] = (rgb - (rgb >> 2) - (rgb >> 3)) & 0xf8f8ff;
        }
        Self {
            texels,
            translucent: source.translucent,
        }
    }

    pub fn is_translucent(&self) -> bool {
        self.translucent
    }

    /// Fetch a texel; the index wraps into the layer.
    #[inline]
    pub fn texel(&self, index: i32) -> u32 {
        self.texels[(index as u32 as usize) & (LAYER_TEXELS - 1)]
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.texels
    }
}

/// Fixed-size set of texture layers addressed by id.
///
/// Ids below `count` without a source resolve to an all-zero opaque layer.
#[derive(Debug, Clone)]
pub struct TextureAtlas {
    count: u32,
    brightness: f64,
    sources: Vec<Option<TextureSource>>,
    layers: Vec<Option<TextureLayer>>,
    empty: TextureLayer,
}

impl TextureAtlas {
    pub fn new(count: u32, brightness: f64) -> Result<Self, PaletteError> {
        validate_brightness(brightness)?;
        Ok(Self {
            count,
            brightness,
            sources: vec![None; count as usize],
            layers: vec![None; count as usize],
            empty: TextureLayer::empty(),
        })
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn brightness(&self) -> f64 {
        self.brightness
    }

    fn check_id(&self, id: u32) -> Result<usize, PaletteError> {
        if id < self.count {
            Ok(id as usize)
        } else {
            Err(PaletteError::TextureOutOfRange {
                id,
                count: self.count,
            })
        }
    }

    pub fn contains(&self, id: u32) -> bool {
        id < self.count
    }

    /// Replace a texture's source and rebuild its layer.
    pub fn set_texture(&mut self, id: u32, source: TextureSource) -> Result<(), PaletteError> {
        let slot = self.check_id(id)?;
        if source.texels.len() != TEXTURE_TEXELS {
            return Err(PaletteError::TexelCount {
                expected: TEXTURE_TEXELS,
                actual: source.texels.len(),
            });
        }
        self.layers[slot] = Some(TextureLayer::build(&source, self.brightness));
        self.sources[slot] = Some(source);
        tracing::debug!(id, "texture layer rebuilt");
        Ok(())
    }

    /// Rebuild one layer from its stored source.
    pub fn update_texture(&mut self, id: u32) -> Result<(), PaletteError> {
        let slot = self.check_id(id)?;
        let source = self.sources[slot]
            .as_ref()
            .ok_or(PaletteError::MissingSource { id })?;
        self.layers[slot] = Some(TextureLayer::build(source, self.brightness));
        Ok(())
    }

    /// Rebuild every layer under a new brightness.
    pub fn set_brightness(&mut self, brightness: f64) -> Result<(), PaletteError> {
        validate_brightness(brightness)?;
        self.brightness = brightness;
        let mut rebuilt = 0;
        for (source, layer) in self.sources.iter().zip(self.layers.iter_mut()) {
            if let Some(source) = source {
                *layer = Some(TextureLayer::build(source, brightness));
                rebuilt += 1;
            }
        }
        tracing::debug!(rebuilt, brightness, "texture atlas rebuilt");
        Ok(())
    }

    pub fn layer(&self, id: u32) -> Result<&TextureLayer, PaletteError> {
        let slot = self.check_id(id)?;
        Ok(self.layers[slot].as_ref().unwrap_or(&self.empty))
    }

    pub fn is_translucent(&self, id: u32) -> bool {
        self.layer(id).map(|l| l.is_translucent()).unwrap_or(false)
    }

    pub fn source(&self, id: u32) -> Option<&TextureSource> {
        self.sources.get(id as usize).and_then(|s| s.as_ref())
    }

    /// Snapshot of all loaded sources.
    pub fn to_set(&self) -> TextureSet {
        let textures = self
            .sources
            .iter()
            .enumerate()
            .filter_map(|(id, s)| s.clone().map(|s| (id as u32, s)))
            .collect();
        TextureSet { textures }
    }

    /// Load every texture of a set; ids outside the atlas are an error.
    pub fn load_set(&mut self, set: TextureSet) -> Result<usize, PaletteError> {
        let mut loaded = 0;
        for (id, source) in set.textures {
            self.set_texture(id, source)?;
            loaded += 1;
        }
        Ok(loaded)
    }
}

/// Serializable collection of texture sources keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureSet {
    pub textures: BTreeMap<u32, TextureSource>,
}

impl TextureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: u32, source: TextureSource) {
        self.textures.insert(id, source);
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Save the set to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PaletteError> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(file, self)?;
        Ok(())
    }

    /// Load a set from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PaletteError> {
        let file = std::fs::File::open(path)?;
        let set: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shade_bands_follow_masks() {
        let mut atlas = TextureAtlas::new(4, 1.0).unwrap();
        atlas.set_texture(1, TextureSource::solid(0x8040ff)).unwrap();
        let layer = atlas.layer(1).unwrap();
        let rgb = 0x8040ffu32;
        assert_eq!(layer.texel(0), rgb & 0xf8f8ff);
        assert_eq!(
            layer.texel(TEXTURE_TEXELS as i32),
            (rgb - (rgb >> 3)) & 0xf8f8ff
        );
        assert_eq!(
            layer.texel(2 * TEXTURE_TEXELS as i32),
            (rgb - (rgb >> 2)) & 0xf8f8ff
        );
        assert_eq!(
            layer.texel(3 * TEXTURE_TEXELS as i32),
            (rgb - (rgb >> 2) - (rgb >> 3)) & 0xf8f8ff
        );
    }

    #[test]
    fn out_of_range_id_rejected() {
        let mut atlas = TextureAtlas::new(2, 0.9).unwrap();
        assert!(matches!(
            atlas.layer(2),
            Err(PaletteError::TextureOutOfRange { id: 2, count: 2 })
        ));
        assert!(atlas.set_texture(5, TextureSource::solid(1)).is_err());
        assert!(!atlas.contains(2));
    }

    #[test]
    fn unloaded_layer_is_empty_and_opaque() {
        let atlas = TextureAtlas::new(3, 0.9).unwrap();
        let layer = atlas.layer(0).unwrap();
        assert!(!layer.is_translucent());
        assert!(layer.as_slice().iter().all(|&t| t == 0));
    }

    #[test]
    fn brightness_change_rebuilds_layers() {
        let mut atlas = TextureAtlas::new(2, 1.0).unwrap();
        atlas.set_texture(0, TextureSource::solid(0x404040)).unwrap();
        let before = atlas.layer(0).unwrap().texel(0);
        atlas.set_brightness(0.5).unwrap();
        let after = atlas.layer(0).unwrap().texel(0);
        assert!(after > before);
        assert_eq!(after, adjust_brightness(0x404040, 0.5) & 0xf8f8ff);
    }

    #[test]
    fn translucent_zero_texels_survive_shading() {
        let mut atlas = TextureAtlas::new(1, 0.9).unwrap();
        atlas
            .set_texture(0, TextureSource::checker(0, 0xffffff, 8, true))
            .unwrap();
        let layer = atlas.layer(0).unwrap();
        assert!(layer.is_translucent());
        for band in 0..SHADE_BANDS {
            assert_eq!(layer.texel((band * TEXTURE_TEXELS) as i32), 0);
        }
    }

    #[test]
    fn wrong_texel_count_rejected() {
        assert!(matches!(
            TextureSource::new(vec![0; 10], false),
            Err(PaletteError::TexelCount { actual: 10, .. })
        ));
    }

    #[test]
    fn update_texture_requires_source() {
        let mut atlas = TextureAtlas::new(2, 0.9).unwrap();
        assert!(matches!(
            atlas.update_texture(1),
            Err(PaletteError::MissingSource { id: 1 })
        ));
        atlas.set_texture(1, TextureSource::solid(0x123456)).unwrap();
        atlas.update_texture(1).unwrap();
    }

    #[test]
    fn texture_set_save_and_load() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut set = TextureSet::new();
        set.insert(3, TextureSource::checker(0x112233, 0, 16, true));
        set.save(tmp.path()).unwrap();

        let loaded = TextureSet::load(tmp.path()).unwrap();
        assert_eq!(loaded, set);

        let mut atlas = TextureAtlas::new(4, 0.9).unwrap();
        assert_eq!(atlas.load_set(loaded).unwrap(), 1);
        assert!(atlas.is_translucent(3));
        assert_eq!(atlas.to_set().len(), 1);
    }
}
