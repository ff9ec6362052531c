//! FFmpeg-backed RTSP/RTSPS stream source.

use ffmpeg_next as ffmpeg;
use image::RgbImage;
use tracing::{debug, info, warn};

use super::{StreamOpener, VideoSource};
use crate::error::{CoreError, Result};
use argus_model::CameraConnection;

/// Socket-level open/read timeout, microseconds.
const SOCKET_TIMEOUT_US: &str = "5000000";

/// Opens cameras through FFmpeg with the RTP client forced onto TCP
/// (UDP-only sources drop too many packets to be usable).
#[derive(Debug, Clone)]
pub struct FfmpegOpener;

impl FfmpegOpener {
    /// Initializes FFmpeg for the process; safe to call more than once.
    pub fn new() -> Result<Self> {
        ffmpeg::init()?;
        Ok(Self)
    }

    fn transport_options() -> ffmpeg::Dictionary<'static> {
        let mut opts = ffmpeg::Dictionary::new();
        opts.set("rtsp_transport", "tcp");
        opts.set("stimeout", SOCKET_TIMEOUT_US);
        opts.set("rw_timeout", SOCKET_TIMEOUT_US);
        opts.set("fflags", "nobuffer");
        opts
    }

    fn open_url(url: &str) -> Result<FfmpegSource> {
        let ictx = ffmpeg::format::input_with_dictionary(&url, Self::transport_options())?;

        let stream = ictx
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| CoreError::Stream(format!("no video stream in {url}")))?;
        let stream_index = stream.index();

        let codec_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        debug!(
            "Opened stream {} ({}x{})",
            url,
            decoder.width(),
            decoder.height()
        );

        Ok(FfmpegSource {
            ictx,
            decoder,
            stream_index,
            scaler: None,
        })
    }
}

impl StreamOpener for FfmpegOpener {
    fn open(&self, connection: &CameraConnection) -> Result<Box<dyn VideoSource>> {
        let primary = connection.rtsps_url();
        match Self::open_url(&primary) {
            Ok(source) => {
                info!("Connected via rtsps to {}:{}", connection.host, connection.port);
                Ok(Box::new(source))
            }
            Err(e) => {
                let fallback = connection.rtsp_fallback_url();
                warn!("rtsps open failed ({e}), falling back to {fallback}");
                let source = Self::open_url(&fallback)?;
                info!("Connected via rtsp fallback to {}", connection.host);
                Ok(Box::new(source))
            }
        }
    }
}

/// Cached scaler keyed by the source frame geometry, recreated if the
/// stream renegotiates its resolution or pixel format mid-run.
struct Scaler {
    ctx: ffmpeg::software::scaling::Context,
    width: u32,
    height: u32,
    format: ffmpeg::format::Pixel,
}

// ffmpeg-next's `scaling::Context` wraps a raw `*mut SwsContext` and, unlike
// sibling FFI wrappers in the same crate (`Input`, `codec::Context`, `Frame`),
// doesn't implement `Send` itself. It carries no thread-affinity state, so
// moving it between threads is as safe as the other FFI wrappers.
unsafe impl Send for Scaler {}

pub struct FfmpegSource {
    ictx: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    stream_index: usize,
    scaler: Option<Scaler>,
}

impl std::fmt::Debug for FfmpegSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegSource")
            .field("stream_index", &self.stream_index)
            .finish_non_exhaustive()
    }
}

impl FfmpegSource {
    fn to_rgb(&mut self, frame: &ffmpeg::frame::Video) -> Result<RgbImage> {
        let (width, height, format) = (frame.width(), frame.height(), frame.format());
        if width == 0 || height == 0 {
            return Err(CoreError::Stream("decoded frame with zero size".into()));
        }

        let needs_new = match &self.scaler {
            Some(s) => s.width != width || s.height != height || s.format != format,
            None => true,
        };
        if needs_new {
            let ctx = ffmpeg::software::scaling::Context::get(
                format,
                width,
                height,
                ffmpeg::format::Pixel::RGB24,
                width,
                height,
                ffmpeg::software::scaling::flag::Flags::BILINEAR,
            )?;
            self.scaler = Some(Scaler {
                ctx,
                width,
                height,
                format,
            });
        }

        let Some(scaler) = self.scaler.as_mut() else {
            return Err(CoreError::Internal("scaler unavailable".into()));
        };
        let mut rgb = ffmpeg::frame::Video::empty();
        scaler.ctx.run(frame, &mut rgb)?;

        let data = rgb.data(0);
        let stride = rgb.stride(0);
        let buffer = image::ImageBuffer::from_fn(width, height, |x, y| {
            let offset = y as usize * stride + x as usize * 3;
            image::Rgb([data[offset], data[offset + 1], data[offset + 2]])
        });
        Ok(buffer)
    }
}

impl VideoSource for FfmpegSource {
    fn read_frame(&mut self) -> Result<RgbImage> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            // Drain frames already buffered in the decoder before feeding
            // the next packet.
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.to_rgb(&decoded);
            }

            let Some((stream, packet)) = self.ictx.packets().next() else {
                return Err(CoreError::Stream("stream ended".into()));
            };
            if stream.index() != self.stream_index {
                continue;
            }
            self.decoder.send_packet(&packet)?;
        }
    }
}
