use image::imageops::ColorMap;
use image::Rgb;

/// Nominal colours of the six inks, in panel index order.
pub const NOMINAL: [[u8; 3]; 6] = [
    [0, 0, 0],
    [255, 255, 255],
    [0, 255, 0],
    [0, 0, 255],
    [255, 0, 0],
    [255, 255, 0],
];

/// What the inks actually look like on the panel.
const MEASURED: [[u8; 3]; 6] = [
    [57, 48, 57],
    [255, 255, 255],
    [58, 91, 70],
    [61, 59, 94],
    [156, 72, 75],
    [208, 190, 71],
];

/// Quantisation palette for the panel.
///
/// `saturation` blends between the nominal ink colours (0.0) and the measured
/// ones (1.0). Matching against the measured colours pushes vivid source pixels
/// onto the coloured inks more eagerly.
#[derive(Debug, Clone)]
pub struct Palette {
    colors: [Rgb<u8>; 6],
}

impl Palette {
    pub fn with_saturation(saturation: f32) -> Self {
        let saturation = saturation.clamp(0.0, 1.0);
        let mut colors = [Rgb([0, 0, 0]); 6];

        for (slot, (nominal, measured)) in colors.iter_mut().zip(NOMINAL.iter().zip(MEASURED)) {
            let mut blended = [0u8; 3];
            for (channel, (n, m)) in blended.iter_mut().zip(nominal.iter().zip(measured)) {
                let value = f32::from(m) * saturation + f32::from(*n) * (1.0 - saturation);
                *channel = value.round() as u8;
            }
            *slot = Rgb(blended);
        }

        Self { colors }
    }

    pub fn nominal(index: usize) -> Rgb<u8> {
        Rgb(NOMINAL[index.min(NOMINAL.len() - 1)])
    }
}

impl ColorMap for Palette {
    type Color = Rgb<u8>;

    fn index_of(&self, color: &Rgb<u8>) -> usize {
        let distance = |candidate: &Rgb<u8>| -> u32 {
            candidate
                .0
                .iter()
                .zip(color.0)
                .map(|(a, b)| u32::from(a.abs_diff(b)).pow(2))
                .sum()
        };

        self.colors
            .iter()
            .enumerate()
            .min_by_key(|&(_, candidate)| distance(candidate))
            .map(|(index, _)| index)
            .unwrap_or(0)
    }

    fn lookup(&self, index: usize) -> Option<Rgb<u8>> {
        self.colors.get(index).copied()
    }

    fn has_lookup(&self) -> bool {
        true
    }

    fn map_color(&self, color: &mut Rgb<u8>) {
        *color = self.colors[self.index_of(color)];
    }
}

/// Reduce `image` to the nominal ink colours.
pub fn quantize(image: &image::RgbImage, palette: &Palette, dither: bool) -> image::RgbImage {
    let mut work = image.clone();
    if dither {
        image::imageops::dither(&mut work, palette);
    }

    for pixel in work.pixels_mut() {
        *pixel = Palette::nominal(palette.index_of(pixel));
    }
    work
}

#[cfg(test)]
mod tests {
    use image::imageops::ColorMap;
    use image::Rgb;
    use image::RgbImage;

    use super::*;

    #[test]
    fn test_primary_colors_map_to_their_ink() {
        for saturation in [0.0, 0.5, 1.0] {
            let palette = Palette::with_saturation(saturation);
            assert_eq!(palette.index_of(&Rgb([255, 0, 0])), 4, "{saturation}");
            assert_eq!(palette.index_of(&Rgb([0, 0, 0])), 0, "{saturation}");
            assert_eq!(palette.index_of(&Rgb([250, 250, 250])), 1, "{saturation}");
        }
    }

    #[test]
    fn test_blend_endpoints() {
        let palette = Palette::with_saturation(0.0);
        assert_eq!(palette.lookup(4), Some(Rgb([255, 0, 0])));

        let palette = Palette::with_saturation(1.0);
        assert_eq!(palette.lookup(4), Some(Rgb([156, 72, 75])));
    }

    #[test]
    fn test_quantize_outputs_only_nominal_colors() {
        let image = RgbImage::from_fn(32, 16, |x, y| Rgb([(x * 8) as u8, (y * 16) as u8, 128]));
        let palette = Palette::with_saturation(0.5);

        for dither in [false, true] {
            let out = quantize(&image, &palette, dither);
            assert_eq!(out.dimensions(), image.dimensions());
            assert!(out.pixels().all(|p| NOMINAL.contains(&p.0)));
        }
    }
}
