//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{CtWindow, GeoError, GeoResult, Idx2d, Idx3d, ImgWriteVis};

pub use crate::geometry::{Grid, Point3};

pub use crate::raster::{rasterize_polygon, xor_polygon};

pub use crate::structure::{
    bind_slice, Contour, DuplicatePolicy, NameMatch, SliceTolerance, Structure, StructureSet,
};

pub use crate::mask::{build_masks, write_mask_archive, MaskOptions, MaskVolume};
#[cfg(feature = "rayon")]
pub use crate::mask::par_build_masks;

pub use crate::registration::{
    decode_rigid_transform, RegistrationItem, RegistrationRecord, RigidTransform,
};

pub use crate::resample::{resample, Interpolation, ResampleOptions, ResampledVolume};
#[cfg(feature = "rayon")]
pub use crate::resample::par_resample;

pub use crate::consts::gray::{MASK_BACKGROUND, MASK_FOREGROUND};
pub use crate::consts::hu::{CBCT_AIR, CT_AIR};
