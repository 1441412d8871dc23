// THEORY (1D Pixel Heuristics):
// The `Pixel` module is the most fundamental unit of the engine. It is a "dumb" data
// container for a single RGB pixel plus the handful of single-pixel transforms the
// higher layers need: hue/saturation/value for the colour histograms and the graph
// segmenter, and luminance for the grayscale planes used by corner selection and
// point tracking. Anything that needs a neighbour (gradients, smoothing, motion)
// lives in `plane`.
//
// HSV convention:
// - Hue is stored on a half-degree scale, [0, 180), so it fits a byte.
// - Saturation and value are scaled to [0, 255].
// These are the ranges `ColorHistogram` bins over (180 and 256 respectively).

pub mod pixel {
    pub type Channel = u8;
    pub type NormalizedChannel = f32;
    pub type Hue = f32;
    pub type SaturationHSV = f32;
    pub type ValueHSV = f32;
    pub type Luminance = f32;

    /// Hue range of the byte-packed HSV representation.
    pub const HUE_RANGE: f32 = 180.0;
    /// Saturation and value range of the byte-packed HSV representation.
    pub const SV_RANGE: f32 = 256.0;

    /// A "dumb" data container representing a single RGB pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    pub struct Pixel {
        pub red: Channel,
        pub green: Channel,
        pub blue: Channel,
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel) -> Self {
            Pixel { red, green, blue }
        }

        fn normalized(&self) -> (NormalizedChannel, NormalizedChannel, NormalizedChannel) {
            (
                self.red as NormalizedChannel / 255.0,
                self.green as NormalizedChannel / 255.0,
                self.blue as NormalizedChannel / 255.0,
            )
        }

        /// Luminance estimate (Rec. 601 luma) on the 0..255 scale.
        pub fn luminance(&self) -> Luminance {
            0.299 * self.red as f32 + 0.587 * self.green as f32 + 0.114 * self.blue as f32
        }

        /// Hue angle in degrees [0, 360). Gray pixels have hue 0.
        pub fn hue(&self) -> Hue {
            let (red, green, blue) = self.normalized();
            let maximum_channel = red.max(green.max(blue));
            let minimum_channel = red.min(green.min(blue));
            let chroma = maximum_channel - minimum_channel;

            if chroma <= 1e-6 {
                return 0.0;
            }

            let (base_difference, sector_offset) = if maximum_channel == red {
                (green - blue, 0.0)
            } else if maximum_channel == green {
                (blue - red, 2.0)
            } else {
                (red - green, 4.0)
            };

            let mut hue_degrees = (base_difference / chroma + sector_offset) * 60.0;
            if hue_degrees < 0.0 {
                hue_degrees += 360.0;
            }
            hue_degrees
        }

        /// HSV saturation (chroma / value) in [0, 1]. Zero for black.
        pub fn saturation_hsv(&self) -> SaturationHSV {
            let (red, green, blue) = self.normalized();
            let value = red.max(green.max(blue));
            if value <= 1e-6 {
                return 0.0;
            }
            (value - red.min(green.min(blue))) / value
        }

        /// HSV value: max(R, G, B) in [0, 1].
        pub fn value_hsv(&self) -> ValueHSV {
            let (red, green, blue) = self.normalized();
            red.max(green.max(blue))
        }

        /// Byte-packed HSV: hue in [0, 180), saturation and value in [0, 255].
        pub fn to_hsv8(&self) -> [u8; 3] {
            let hue = (self.hue() / 2.0).round();
            let hue = if hue >= HUE_RANGE { 0.0 } else { hue };
            [
                hue as u8,
                (self.saturation_hsv() * 255.0).round() as u8,
                (self.value_hsv() * 255.0).round() as u8,
            ]
        }
    }

    impl From<image::Rgb<u8>> for Pixel {
        fn from(rgb: image::Rgb<u8>) -> Self {
            Pixel::new(rgb.0[0], rgb.0[1], rgb.0[2])
        }
    }

}
