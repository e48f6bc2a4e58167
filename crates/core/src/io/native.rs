//! GeoTIFF reading/writing on top of the `tiff` crate.
//!
//! Georeferencing is carried in the standard GeoTIFF tags:
//!
//! - `ModelPixelScaleTag` (33550) and `ModelTiepointTag` (33922) for the
//!   north-up affine transform
//! - `GeoKeyDirectoryTag` (34735) for the model type and EPSG code
//! - `GDAL_NODATA` (42113) as an ASCII number for the no-data sentinel
//!
//! Rasters are written in their native sample type, so flow codes stay
//! `u8` and accumulation counts stay exact `u32`.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement, SampleFormat};
use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::{ColorType, Gray32, Gray32Float, Gray64Float, Gray8, GrayI32};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;
use tracing::debug;

const TAG_PIXEL_SCALE: u16 = 33550;
const TAG_TIEPOINT: u16 = 33922;
const TAG_GEO_KEYS: u16 = 34735;
const TAG_GDAL_NODATA: u16 = 42113;

const KEY_MODEL_TYPE: u16 = 1024;
const KEY_RASTER_TYPE: u16 = 1025;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_TYPE: u16 = 3072;

const MODEL_PROJECTED: u16 = 1;
const MODEL_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const USER_DEFINED: u16 = 32767;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    /// Override the no-data value written to `GDAL_NODATA`
    pub nodata: Option<f64>,
}

/// Load a DEM for conditioning.
///
/// Fails with [`Error::NotFound`] when `path` does not exist and with
/// [`Error::MissingCrs`] when the file carries no usable CRS.
pub fn load_dem<P: AsRef<Path>>(path: P) -> Result<Raster<f64>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::NotFound(path.to_path_buf()));
    }

    let dem: Raster<f64> = read_geotiff(path)?;
    if dem.crs().is_none() {
        return Err(Error::MissingCrs);
    }

    debug!(
        path = %path.display(),
        rows = dem.rows(),
        cols = dem.cols(),
        nodata = ?dem.nodata(),
        "loaded DEM"
    );
    Ok(dem)
}

/// Read the first band of a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(file)
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T: RasterElement>(data: &[u8]) -> Result<Raster<T>> {
    decode_geotiff(Cursor::new(data))
}

fn tiff_err(context: &str) -> impl Fn(tiff::TiffError) -> Error + '_ {
    move |e| Error::MalformedRaster(format!("{}: {}", context, e))
}

fn convert<S, T>(buf: Vec<S>) -> Result<Vec<T>>
where
    S: Copy + Into<f64>,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| {
            let v: f64 = v.into();
            T::from_f64(v).ok_or_else(|| {
                Error::UnsupportedDataType(format!("sample {} does not fit the raster type", v))
            })
        })
        .collect()
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader)
        .map_err(tiff_err("cannot open TIFF"))?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder
        .dimensions()
        .map_err(tiff_err("cannot read dimensions"))?;
    let rows = height as usize;
    let cols = width as usize;
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions { width: cols, height: rows });
    }

    let data: Vec<T> = match decoder.read_image().map_err(tiff_err("cannot read image data"))? {
        DecodingResult::U8(buf) => convert(buf)?,
        DecodingResult::U16(buf) => convert(buf)?,
        DecodingResult::U32(buf) => convert(buf)?,
        DecodingResult::I8(buf) => convert(buf)?,
        DecodingResult::I16(buf) => convert(buf)?,
        DecodingResult::I32(buf) => convert(buf)?,
        DecodingResult::F32(buf) => convert(buf)?,
        DecodingResult::F64(buf) => convert(buf)?,
        _ => {
            return Err(Error::UnsupportedDataType(
                "unsupported TIFF sample format".to_string(),
            ))
        }
    };

    // multi-band files decode interleaved; only single-band DEMs are supported
    if data.len() != rows * cols {
        return Err(Error::MalformedRaster(format!(
            "expected {} samples for a {}x{} band, found {}",
            rows * cols,
            cols,
            rows,
            data.len()
        )));
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));
    raster.set_nodata(read_nodata::<T, R>(&mut decoder));

    Ok(raster)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_PIXEL_SCALE))
        .ok()?;
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_TIEPOINT))
        .ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder
        .get_tag_u16_vec(Tag::from_u16_exhaustive(TAG_GEO_KEYS))
        .ok()?;
    if keys.len() < 4 {
        return None;
    }

    let mut model_type = None;
    let mut geographic = None;
    let mut projected = None;

    // header is [version, revision, minor, count], then 4 shorts per key
    for entry in keys[4..].chunks_exact(4) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 {
            continue;
        }
        match key {
            KEY_MODEL_TYPE => model_type = Some(value),
            KEY_GEOGRAPHIC_TYPE if value != USER_DEFINED => geographic = Some(value),
            KEY_PROJECTED_TYPE if value != USER_DEFINED => projected = Some(value),
            _ => {}
        }
    }

    match model_type {
        Some(MODEL_PROJECTED) => projected.map(|code| CRS::from_epsg(code as u32)),
        Some(MODEL_GEOGRAPHIC) => geographic.map(|code| CRS::from_epsg(code as u32)),
        _ => projected.or(geographic).map(|code| CRS::from_epsg(code as u32)),
    }
}

fn read_nodata<T: RasterElement, R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<T> {
    let text = decoder
        .get_tag_ascii_string(Tag::from_u16_exhaustive(TAG_GDAL_NODATA))
        .ok()?;
    let value: f64 = text.trim_matches(char::from(0)).trim().parse().ok()?;
    T::from_f64(value)
}

/// Write a Raster to a GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(raster, &mut writer, options.unwrap_or_default())?;
    writer.flush()?;
    Ok(())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T: RasterElement>(
    raster: &Raster<T>,
    options: Option<GeoTiffOptions>,
) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_geotiff(raster, &mut Cursor::new(&mut buf), options.unwrap_or_default())?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: &mut W, options: GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer).map_err(tiff_err("cannot create TIFF encoder"))?;
    let values = raster.data().iter().map(|v| v.to_f64());
    let nodata = options
        .nodata
        .or_else(|| raster.nodata().map(RasterElement::to_f64));

    // every sample came from a T, so the `as` casts below are exact
    match T::FORMAT {
        SampleFormat::Bool | SampleFormat::U8 => {
            let data: Vec<u8> = values.map(|v| v as u8).collect();
            write_band::<_, Gray8, _>(&mut encoder, raster, nodata, &data)
        }
        SampleFormat::U32 => {
            let data: Vec<u32> = values.map(|v| v as u32).collect();
            write_band::<_, Gray32, _>(&mut encoder, raster, nodata, &data)
        }
        SampleFormat::I32 => {
            let data: Vec<i32> = values.map(|v| v as i32).collect();
            write_band::<_, GrayI32, _>(&mut encoder, raster, nodata, &data)
        }
        SampleFormat::F32 => {
            let data: Vec<f32> = values.map(|v| v as f32).collect();
            write_band::<_, Gray32Float, _>(&mut encoder, raster, nodata, &data)
        }
        SampleFormat::F64 => {
            let data: Vec<f64> = values.collect();
            write_band::<_, Gray64Float, _>(&mut encoder, raster, nodata, &data)
        }
    }
}

fn write_band<W, C, T>(
    encoder: &mut TiffEncoder<W>,
    raster: &Raster<T>,
    nodata: Option<f64>,
    data: &[C::Inner],
) -> Result<()>
where
    W: Write + Seek,
    C: ColorType,
    T: RasterElement,
    [C::Inner]: TiffValue,
{
    let (rows, cols) = raster.shape();
    let mut image = encoder
        .new_image::<C>(cols as u32, rows as u32)
        .map_err(tiff_err("cannot create TIFF image"))?;

    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(TAG_PIXEL_SCALE), &scale[..])
        .map_err(tiff_err("cannot write pixel scale"))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(TAG_TIEPOINT), &tiepoint[..])
        .map_err(tiff_err("cannot write tiepoint"))?;

    let geokeys = geo_key_directory(raster.crs());
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(TAG_GEO_KEYS), &geokeys[..])
        .map_err(tiff_err("cannot write GeoKey directory"))?;

    if let Some(nd) = nodata {
        let text = format_nodata(nd);
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(TAG_GDAL_NODATA), text.as_str())
            .map_err(tiff_err("cannot write nodata tag"))?;
    }

    image
        .write_data(data)
        .map_err(tiff_err("cannot write image data"))?;
    Ok(())
}

/// GeoKey directory for `crs`. Without an EPSG code only the raster type is recorded.
fn geo_key_directory(crs: Option<&CRS>) -> Vec<u16> {
    let mut keys: Vec<[u16; 4]> = Vec::new();

    let code = crs
        .and_then(CRS::epsg)
        .and_then(|c| u16::try_from(c).ok());
    if let (Some(crs), Some(code)) = (crs, code) {
        if crs.is_geographic() {
            keys.push([KEY_MODEL_TYPE, 0, 1, MODEL_GEOGRAPHIC]);
            keys.push([KEY_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA]);
            keys.push([KEY_GEOGRAPHIC_TYPE, 0, 1, code]);
        } else {
            keys.push([KEY_MODEL_TYPE, 0, 1, MODEL_PROJECTED]);
            keys.push([KEY_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA]);
            keys.push([KEY_PROJECTED_TYPE, 0, 1, code]);
        }
    } else {
        keys.push([KEY_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA]);
    }

    let mut directory = vec![1, 1, 0, keys.len() as u16];
    directory.extend(keys.into_iter().flatten());
    directory
}

fn format_nodata(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        format!("{}", value)
    }
}
