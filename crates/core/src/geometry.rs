//! Screen-mask to native-pixel crop geometry.
//!
//! This module translates the on-screen capture guide (the "mask" rectangle
//! shown to the user in logical pixels) into a crop window in the captured
//! image's native pixel space.
//!
//! # Coordinate Mapping
//!
//! The capture UI lays out the mask in logical screen coordinates (e.g.
//! 390x844) while the captured photo is in native pixels (e.g. 3000x2000),
//! usually at a much higher resolution and not necessarily in the same
//! orientation: camera pipelines frequently report width/height swapped
//! relative to the preview. When the image's landscape/portrait
//! classification differs from the screen's, the mapping swaps axes so the
//! screen's vertical axis lands on the image's horizontal axis.

use crate::error::{AppError, Result};

/// Width of the document capture guide as a fraction of the screen width.
pub const CARD_MASK_WIDTH_FRACTION: f64 = 0.9;

/// Height of the capture guide as a fraction of its width (ID-card shape).
pub const CARD_MASK_ASPECT: f64 = 0.63;

/// Outward crop expansion used by the OCR flow, tuned to avoid clipping
/// card edges while keeping background to a minimum.
pub const CARD_CROP_PADDING: PaddingFractions = PaddingFractions {
    horizontal: 0.03,
    vertical: 0.05,
};

/// The capture guide rectangle and the screen it was laid out on, in
/// logical pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct MaskGeometry {
    pub mask_width: f64,
    pub mask_height: f64,
    pub mask_left: f64,
    pub mask_top: f64,
    pub screen_width: f64,
    pub screen_height: f64,
}

impl MaskGeometry {
    /// Creates a mask geometry, validating that the mask fits the screen.
    pub fn new(
        mask_width: f64,
        mask_height: f64,
        mask_left: f64,
        mask_top: f64,
        screen_width: f64,
        screen_height: f64,
    ) -> Result<Self> {
        let geometry = Self {
            mask_width,
            mask_height,
            mask_left,
            mask_top,
            screen_width,
            screen_height,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Builds the standard document-capture guide: 90% of the screen width,
    /// fixed card aspect ratio, centered in both axes.
    pub fn centered_card(screen_width: f64, screen_height: f64) -> Result<Self> {
        let mask_width = screen_width * CARD_MASK_WIDTH_FRACTION;
        let mask_height = mask_width * CARD_MASK_ASPECT;
        Self::new(
            mask_width,
            mask_height,
            (screen_width - mask_width) / 2.0,
            (screen_height - mask_height) / 2.0,
            screen_width,
            screen_height,
        )
    }

    /// Checks that all components are finite, sizes are positive, and the
    /// mask lies within the screen bounds.
    pub fn validate(&self) -> Result<()> {
        let components = [
            self.mask_width,
            self.mask_height,
            self.mask_left,
            self.mask_top,
            self.screen_width,
            self.screen_height,
        ];
        if components.iter().any(|value| !value.is_finite()) {
            return Err(AppError::invalid_input(
                "mask geometry contains a non-finite component",
            ));
        }
        if self.mask_width <= 0.0
            || self.mask_height <= 0.0
            || self.screen_width <= 0.0
            || self.screen_height <= 0.0
        {
            return Err(AppError::invalid_input(
                "mask and screen dimensions must be positive",
            ));
        }
        if self.mask_left < 0.0
            || self.mask_top < 0.0
            || self.mask_left + self.mask_width > self.screen_width
            || self.mask_top + self.mask_height > self.screen_height
        {
            return Err(AppError::invalid_input(
                "mask must lie within the screen bounds",
            ));
        }
        Ok(())
    }
}

/// Outward expansion of the crop window, as fractions of the base crop
/// extents. Horizontal applies to the image-space x axis, vertical to y.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaddingFractions {
    pub horizontal: f64,
    pub vertical: f64,
}

impl PaddingFractions {
    /// No expansion.
    pub const NONE: Self = Self {
        horizontal: 0.0,
        vertical: 0.0,
    };

    /// Clamps negative fractions to zero (no expansion) and rejects
    /// fractions that are non-finite or at least 0.5.
    fn normalized(self) -> Result<Self> {
        if !self.horizontal.is_finite() || !self.vertical.is_finite() {
            return Err(AppError::invalid_input(
                "padding fractions must be finite",
            ));
        }
        if self.horizontal >= 0.5 || self.vertical >= 0.5 {
            return Err(AppError::invalid_input(
                "padding fractions must be below 0.5",
            ));
        }
        Ok(Self {
            horizontal: self.horizontal.max(0.0),
            vertical: self.vertical.max(0.0),
        })
    }
}

/// A crop window in native image pixels.
///
/// A zero-extent rectangle is a legal output of the mapping (the mask can
/// fall outside a sufficiently small image); crop codecs reject it at
/// invocation time and the pipeline falls back to the uncropped image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    /// Returns true when either extent is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Maps mask geometry into native-pixel crop rectangles.
pub struct GeometryMapper;

impl GeometryMapper {
    /// Computes the native-pixel crop window for a captured image.
    ///
    /// Scale factors are derived per axis from the image and screen
    /// dimensions. When the image's orientation classification (landscape
    /// iff width > height) differs from the screen's, the axes are swapped:
    /// the mask's top offset maps to the image x origin and its left offset
    /// to the image y origin.
    ///
    /// Padding expands the window outward: the origin moves earlier by the
    /// padding (floored at zero) and each extent grows by twice the padding.
    /// The result is clamped so it never extends past the image bounds.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidInput`] if the image dimensions are zero,
    /// the mask geometry is invalid, or a padding fraction is out of range.
    pub fn compute_crop_rect(
        image_width: u32,
        image_height: u32,
        mask: &MaskGeometry,
        padding: PaddingFractions,
    ) -> Result<CropRect> {
        if image_width == 0 || image_height == 0 {
            return Err(AppError::invalid_input(
                "image dimensions must be positive",
            ));
        }
        mask.validate()?;
        let padding = padding.normalized()?;

        let image_w = f64::from(image_width);
        let image_h = f64::from(image_height);

        let image_landscape = image_w > image_h;
        let screen_landscape = mask.screen_width > mask.screen_height;

        let (base_width, base_height, raw_origin_x, raw_origin_y) =
            if image_landscape != screen_landscape {
                // Axes swapped: the screen's vertical axis runs along the
                // image's horizontal axis.
                let scale_x = image_h / mask.screen_width;
                let scale_y = image_w / mask.screen_height;
                (
                    mask.mask_height * scale_y,
                    mask.mask_width * scale_x,
                    mask.mask_top * scale_x,
                    mask.mask_left * scale_y,
                )
            } else {
                let scale_x = image_w / mask.screen_width;
                let scale_y = image_h / mask.screen_height;
                (
                    mask.mask_width * scale_x,
                    mask.mask_height * scale_y,
                    mask.mask_left * scale_x,
                    mask.mask_top * scale_y,
                )
            };

        let padding_x = base_width * padding.horizontal;
        let padding_y = base_height * padding.vertical;

        let origin_x = (raw_origin_x - padding_x).floor().max(0.0);
        let origin_y = (raw_origin_y - padding_y).floor().max(0.0);

        let width = (base_width + padding_x * 2.0)
            .floor()
            .min(image_w - origin_x)
            .max(0.0);
        let height = (base_height + padding_y * 2.0)
            .floor()
            .min(image_h - origin_y)
            .max(0.0);

        Ok(CropRect {
            x: origin_x as u32,
            y: origin_y as u32,
            width: width as u32,
            height: height as u32,
        })
    }
}
