//! Entry points: catalog → partitioner → rescaler.

use crate::catalog::CatalogKind;
use crate::config::PrepConfig;
use crate::data::loader::RecordLoader;
use crate::data::model::DatasetBundle;
use crate::error::Result;
use crate::partition::DataPartitioner;
use crate::rescale::{FitMask, Rescaler, ScaleParams};

/// A finished bundle plus the scale it was normalised with.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedData {
    pub bundle: DatasetBundle,
    /// `None` when rescaling was disabled.
    pub scale: Option<ScaleParams>,
}

/// Load, partition and (optionally) rescale one catalog.
///
/// The training catalog fits its scale on every training row; the
/// evaluation catalog fits only on reference rows so evaluation-only
/// categories do not shift the baseline.
pub fn prepare<L: RecordLoader + ?Sized>(
    loader: &L,
    catalog: CatalogKind,
    config: &PrepConfig,
) -> Result<PreparedData> {
    let specs = catalog.specs();
    log::debug!("preparing {catalog} catalog with {config:?}");
    let bundle = DataPartitioner::new(loader).build(&specs, config)?;

    if !config.rescale {
        return Ok(PreparedData {
            bundle,
            scale: None,
        });
    }

    let mask = match catalog {
        CatalogKind::Training => FitMask::AllRows,
        CatalogKind::Evaluation => FitMask::ReferenceRows,
    };
    let (bundle, scale) = Rescaler::new(mask).apply(bundle, config.diagnostic_level())?;
    Ok(PreparedData {
        bundle,
        scale: Some(scale),
    })
}

pub fn prepare_training_data<L: RecordLoader + ?Sized>(
    loader: &L,
    config: &PrepConfig,
) -> Result<PreparedData> {
    prepare(loader, CatalogKind::Training, config)
}

pub fn prepare_evaluation_data<L: RecordLoader + ?Sized>(
    loader: &L,
    config: &PrepConfig,
) -> Result<PreparedData> {
    prepare(loader, CatalogKind::Evaluation, config)
}

/// Either data a caller already prepared, or a request to load it.
#[derive(Debug, Clone)]
pub enum DataSource {
    Prepared(PreparedData),
    Load(CatalogKind),
}

impl DataSource {
    /// Hand back prepared data untouched, or run [`prepare`].
    pub fn resolve<L: RecordLoader + ?Sized>(
        self,
        loader: &L,
        config: &PrepConfig,
    ) -> Result<PreparedData> {
        match self {
            DataSource::Prepared(data) => Ok(data),
            DataSource::Load(catalog) => prepare(loader, catalog, config),
        }
    }
}

impl From<Option<PreparedData>> for DataSource {
    /// `None` means "load the training catalog".
    fn from(data: Option<PreparedData>) -> Self {
        match data {
            Some(data) => DataSource::Prepared(data),
            None => DataSource::Load(CatalogKind::Training),
        }
    }
}
