// THEORY:
// A `Plane` is a single-channel f32 image. It is the working surface for every
// neighbourhood operation in the engine: Gaussian smoothing before segmentation,
// gradient structure tensors for corner selection, and the image pyramids the
// Lucas-Kanade tracker walks coarse-to-fine. Keeping these operations on one small
// owned type (instead of threading `image` buffers through the math) keeps the hot
// loops free of pixel-format conversions.

/// Row-major single-channel image with f32 samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Plane {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    /// Sample with border replication for out-of-range integer coordinates.
    #[inline]
    pub fn get_clamped(&self, x: isize, y: isize) -> f32 {
        let x = x.clamp(0, self.width as isize - 1) as usize;
        let y = y.clamp(0, self.height as isize - 1) as usize;
        self.get(x, y)
    }

    /// Bilinear sample; coordinates outside the plane are clamped to its border.
    pub fn bilinear(&self, x: f32, y: f32) -> f32 {
        let max_x = (self.width - 1) as f32;
        let max_y = (self.height - 1) as f32;
        let x = x.clamp(0.0, max_x);
        let y = y.clamp(0.0, max_y);

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);

        (1.0 - fx) * (1.0 - fy) * self.get(x0, y0)
            + fx * (1.0 - fy) * self.get(x1, y0)
            + (1.0 - fx) * fy * self.get(x0, y1)
            + fx * fy * self.get(x1, y1)
    }

    /// Separable Gaussian blur. `sigma <= 0` returns a copy.
    pub fn gaussian_blur(&self, sigma: f32) -> Plane {
        if sigma <= 0.0 || self.is_empty() {
            return self.clone();
        }
        let kernel = gaussian_kernel(sigma);
        let radius = (kernel.len() / 2) as isize;

        let mut horizontal = Plane::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let mut acc = 0.0;
                for (i, weight) in kernel.iter().enumerate() {
                    acc += weight * self.get_clamped(x as isize + i as isize - radius, y as isize);
                }
                horizontal.set(x, y, acc);
            }
        }

        let mut output = Plane::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let mut acc = 0.0;
                for (i, weight) in kernel.iter().enumerate() {
                    acc += weight
                        * horizontal.get_clamped(x as isize, y as isize + i as isize - radius);
                }
                output.set(x, y, acc);
            }
        }
        output
    }

    /// Takes every other sample in both directions; odd trailing rows/columns are dropped.
    pub fn downsample_2x(&self) -> Plane {
        let width = self.width / 2;
        let height = self.height / 2;
        Plane::from_fn(width, height, |x, y| self.get(x * 2, y * 2))
    }

    /// Central-difference gradients (border-replicated).
    pub fn gradients(&self) -> (Plane, Plane) {
        let gx = Plane::from_fn(self.width, self.height, |x, y| {
            let (x, y) = (x as isize, y as isize);
            0.5 * (self.get_clamped(x + 1, y) - self.get_clamped(x - 1, y))
        });
        let gy = Plane::from_fn(self.width, self.height, |x, y| {
            let (x, y) = (x as isize, y as isize);
            0.5 * (self.get_clamped(x, y + 1) - self.get_clamped(x, y - 1))
        });
        (gx, gy)
    }
}

/// Normalized 1D Gaussian kernel with radius `ceil(4 * sigma)`.
pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (4.0 * sigma).ceil().max(1.0) as isize;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= sum);
    kernel
}

/// Gaussian pyramid; level 0 is the input plane.
#[derive(Debug, Clone)]
pub struct Pyramid {
    pub levels: Vec<Plane>,
}

impl Pyramid {
    /// Builds up to `num_levels` levels, stopping early once a level would be
    /// smaller than `min_side` pixels on either axis.
    pub fn build(base: &Plane, num_levels: usize, min_side: usize) -> Self {
        let mut levels = vec![base.clone()];
        while levels.len() < num_levels.max(1) {
            let Some(previous) = levels.last() else { break };
            if previous.width() / 2 < min_side || previous.height() / 2 < min_side {
                break;
            }
            let next = previous.gaussian_blur(1.0).downsample_2x();
            levels.push(next);
        }
        Pyramid { levels }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let kernel = gaussian_kernel(0.8);
        let sum: f32 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        let n = kernel.len();
        for i in 0..n / 2 {
            assert!((kernel[i] - kernel[n - 1 - i]).abs() < 1e-6);
        }
    }

    #[test]
    fn blur_preserves_constant_plane() {
        let plane = Plane::from_fn(16, 12, |_, _| 42.0);
        let blurred = plane.gaussian_blur(1.5);
        for y in 0..12 {
            for x in 0..16 {
                assert!((blurred.get(x, y) - 42.0).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn bilinear_interpolates_between_samples() {
        let plane = Plane::from_fn(2, 1, |x, _| x as f32 * 10.0);
        assert!((plane.bilinear(0.5, 0.0) - 5.0).abs() < 1e-6);
        assert!((plane.bilinear(-3.0, 0.0) - 0.0).abs() < 1e-6);
        assert!((plane.bilinear(9.0, 0.0) - 10.0).abs() < 1e-6);
    }

    #[test]
    fn pyramid_halves_each_level() {
        let plane = Plane::new(64, 48);
        let pyramid = Pyramid::build(&plane, 3, 8);
        assert_eq!(pyramid.num_levels(), 3);
        assert_eq!(pyramid.levels[1].width(), 32);
        assert_eq!(pyramid.levels[2].height(), 12);

        let shallow = Pyramid::build(&plane, 5, 16);
        assert_eq!(shallow.num_levels(), 2);
    }
}
