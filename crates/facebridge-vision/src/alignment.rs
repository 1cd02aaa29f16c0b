//! Face alignment via a least-squares similarity transform.
//!
//! Maps the five detected landmarks onto the ArcFace reference layout and
//! warps the face into a 112×112 RGB crop.

use image::{Rgb, RgbImage};

/// ArcFace reference landmarks for a 112×112 output.
const REFERENCE_LANDMARKS_112: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

pub const ALIGNED_SIZE: u32 = 112;

/// Similarity transform `dst = [[a, -b], [b, a]] · src + (tx, ty)`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Similarity {
    a: f32,
    b: f32,
    tx: f32,
    ty: f32,
}

impl Similarity {
    /// Closed-form least-squares fit from `src` onto `dst`.
    ///
    /// Treating points as complex numbers, the rotation+scale is
    /// `Σ conj(s')·d' / Σ |s'|²` over mean-centred points.
    fn estimate(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> Self {
        let mean = |pts: &[(f32, f32); 5]| {
            let (sx, sy) = pts.iter().fold((0.0, 0.0), |(ax, ay), &(x, y)| (ax + x, ay + y));
            (sx / 5.0, sy / 5.0)
        };
        let (msx, msy) = mean(src);
        let (mdx, mdy) = mean(dst);

        let (mut re, mut im, mut norm) = (0.0f32, 0.0f32, 0.0f32);
        for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst.iter()) {
            let (sx, sy) = (sx - msx, sy - msy);
            let (dx, dy) = (dx - mdx, dy - mdy);
            re += sx * dx + sy * dy;
            im += sx * dy - sy * dx;
            norm += sx * sx + sy * sy;
        }

        if norm < 1e-12 {
            // Degenerate landmarks: translate only.
            return Self { a: 1.0, b: 0.0, tx: mdx - msx, ty: mdy - msy };
        }

        let a = re / norm;
        let b = im / norm;
        Self {
            a,
            b,
            tx: mdx - (a * msx - b * msy),
            ty: mdy - (b * msx + a * msy),
        }
    }

    #[cfg(test)]
    fn apply(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (self.a * x - self.b * y + self.tx, self.b * x + self.a * y + self.ty)
    }

    /// Map a destination point back into the source image.
    fn invert(&self, (x, y): (f32, f32)) -> Option<(f32, f32)> {
        let det = self.a * self.a + self.b * self.b;
        if det < 1e-12 {
            return None;
        }
        let (dx, dy) = (x - self.tx, y - self.ty);
        Some(((self.a * dx + self.b * dy) / det, (self.a * dy - self.b * dx) / det))
    }
}

/// Bilinear RGB sample; outside the image reads as black.
fn sample(image: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let (x0, y0) = (x0 as i64, y0 as i64);

    let at = |px: i64, py: i64| -> [f32; 3] {
        if px >= 0 && py >= 0 && px < image.width() as i64 && py < image.height() as i64 {
            let p = image.get_pixel(px as u32, py as u32);
            [p[0] as f32, p[1] as f32, p[2] as f32]
        } else {
            [0.0; 3]
        }
    };

    let (tl, tr, bl, br) = (at(x0, y0), at(x0 + 1, y0), at(x0, y0 + 1), at(x0 + 1, y0 + 1));
    Rgb(std::array::from_fn(|c| {
        let top = tl[c] * (1.0 - fx) + tr[c] * fx;
        let bottom = bl[c] * (1.0 - fx) + br[c] * fx;
        (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8
    }))
}

fn warp(image: &RgbImage, transform: &Similarity, size: u32) -> RgbImage {
    RgbImage::from_fn(size, size, |ox, oy| match transform.invert((ox as f32, oy as f32)) {
        Some((sx, sy)) => sample(image, sx, sy),
        None => Rgb([0, 0, 0]),
    })
}

/// Align a detected face to the canonical 112×112 ArcFace crop.
pub fn align_face(image: &RgbImage, landmarks: &[(f32, f32); 5]) -> RgbImage {
    let transform = Similarity::estimate(landmarks, &REFERENCE_LANDMARKS_112);
    warp(image, &transform, ALIGNED_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_transform() {
        let t = Similarity::estimate(&REFERENCE_LANDMARKS_112, &REFERENCE_LANDMARKS_112);
        assert!((t.a - 1.0).abs() < 1e-4, "a = {}", t.a);
        assert!(t.b.abs() < 1e-4, "b = {}", t.b);
        assert!(t.tx.abs() < 1e-3 && t.ty.abs() < 1e-3);
    }

    #[test]
    fn test_scaled_transform() {
        let src = REFERENCE_LANDMARKS_112.map(|(x, y)| (x * 2.0 + 10.0, y * 2.0 - 4.0));
        let t = Similarity::estimate(&src, &REFERENCE_LANDMARKS_112);
        assert!((t.a - 0.5).abs() < 1e-4, "a = {}", t.a);
        let (x, y) = t.apply(src[2]);
        assert!((x - REFERENCE_LANDMARKS_112[2].0).abs() < 1e-2);
        assert!((y - REFERENCE_LANDMARKS_112[2].1).abs() < 1e-2);
    }

    #[test]
    fn test_rotation_recovered() {
        // 90° rotation: (x, y) → (-y, x)
        let src = REFERENCE_LANDMARKS_112.map(|(x, y)| (y, -x));
        let t = Similarity::estimate(&src, &REFERENCE_LANDMARKS_112);
        assert!(t.a.abs() < 1e-4);
        assert!((t.b.abs() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_invert_roundtrip() {
        let t = Similarity { a: 0.8, b: 0.3, tx: 5.0, ty: -2.0 };
        let (x, y) = t.apply((12.0, 34.0));
        let (bx, by) = t.invert((x, y)).unwrap();
        assert!((bx - 12.0).abs() < 1e-3 && (by - 34.0).abs() < 1e-3);
    }

    #[test]
    fn test_align_face_output_size() {
        let image = RgbImage::from_pixel(320, 240, Rgb([128, 64, 32]));
        let aligned = align_face(&image, &REFERENCE_LANDMARKS_112);
        assert_eq!(aligned.dimensions(), (ALIGNED_SIZE, ALIGNED_SIZE));
        assert_eq!(*aligned.get_pixel(56, 56), Rgb([128, 64, 32]));
    }

    #[test]
    fn test_landmark_lands_on_reference() {
        let src: [(f32, f32); 5] = [(80.0, 60.0), (120.0, 60.0), (100.0, 85.0), (85.0, 110.0), (115.0, 110.0)];
        let mut image = RgbImage::new(200, 200);
        for dy in 0..5 {
            for dx in 0..5 {
                image.put_pixel(78 + dx, 58 + dy, Rgb([255, 0, 0]));
            }
        }

        let aligned = align_face(&image, &src);

        let (rx, ry) = (REFERENCE_LANDMARKS_112[0].0.round() as u32, REFERENCE_LANDMARKS_112[0].1.round() as u32);
        let brightest = (rx - 1..=rx + 1)
            .flat_map(|x| (ry - 1..=ry + 1).map(move |y| (x, y)))
            .map(|(x, y)| aligned.get_pixel(x, y)[0])
            .max()
            .unwrap_or(0);
        assert!(brightest > 100, "expected red patch near reference left eye, max={brightest}");
    }
}
