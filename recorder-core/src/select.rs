//! Endpoint resolution heuristics.
//!
//! Hosts surround the real hardware microphone with virtual endpoints —
//! wave mappers, "stereo mix" taps, virtual cables, loopback mirrors.
//! Recording from one of those either captures nothing or leaks system
//! audio into what should be a clean mic track, so candidates are scored
//! by how microphone-like their descriptors look. Loopback resolution
//! goes the other way: find the endpoint that mirrors the default output.
//!
//! The scoring itself is pure over [`DeviceHandle`] slices; the
//! `resolve_*` functions drive it from a [`CaptureBackend`].

use crate::models::device::DeviceHandle;
use crate::models::error::RecordError;
use crate::traits::capture::CaptureBackend;

/// Name fragments that mark an input endpoint as virtual or output-fed.
const VIRTUAL_MARKERS: &[&str] = &[
    "mapper",
    "primary",
    "sound capture",
    "loopback",
    "stereo mix",
    "what u hear",
    "virtual",
    "cable",
    "voicemeeter",
    "output",
    "speaker",
    "headphones",
];

const MIC_MARKERS: &[&str] = &["microphone", "mic"];

const STANDARD_RATES: &[u32] = &[44_100, 48_000, 96_000];

/// Tag appended to a mirrored endpoint's name by loopback hosts.
const LOOPBACK_TAG: &str = "[Loopback]";

fn is_virtual(name: &str) -> bool {
    let lower = name.to_lowercase();
    VIRTUAL_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Score one candidate; `None` means rejected outright.
fn score_microphone(device: &DeviceHandle) -> Option<i32> {
    if is_virtual(&device.name) {
        return None;
    }

    let lower = device.name.to_lowercase();
    let mut score = 0;
    if MIC_MARKERS.iter().any(|marker| lower.contains(marker)) {
        score += 20;
    }
    if STANDARD_RATES.contains(&device.sample_rate) {
        score += 5;
    }
    if (1..=2).contains(&device.max_channels) {
        score += 3;
    }
    Some(score)
}

/// Pick the most microphone-like endpoint from `inputs`.
///
/// Highest score wins, ties broken by enumeration order. When every
/// candidate is rejected as virtual, resolution degrades rather than
/// failing: first to any plain "input"-named endpoint, then to whatever
/// the host enumerated first. Only an empty `inputs` fails.
pub fn pick_microphone(inputs: &[DeviceHandle]) -> Result<DeviceHandle, RecordError> {
    if inputs.is_empty() {
        return Err(RecordError::DeviceNotFound("no input devices present".into()));
    }

    let mut best: Option<(i32, &DeviceHandle)> = None;
    for device in inputs {
        match score_microphone(device) {
            None => log::info!("rejected (virtual/mapper): {}", device.name),
            Some(score) => {
                log::info!("input candidate scored {}: {}", score, device.name);
                if best.map_or(true, |(top, _)| score > top) {
                    best = Some((score, device));
                }
            }
        }
    }

    if let Some((score, device)) = best {
        log::info!("microphone selected: {} (score {})", device.name, score);
        return Ok(device.clone());
    }

    let relaxed = inputs.iter().find(|device| {
        let lower = device.name.to_lowercase();
        lower.contains("input") && !lower.contains("loopback") && !lower.contains("output")
    });
    let fallback = relaxed.unwrap_or(&inputs[0]);
    log::warn!("no ideal microphone found, falling back to: {}", fallback.name);
    Ok(fallback.clone())
}

fn strip_loopback_tag(name: &str) -> String {
    name.replace(LOOPBACK_TAG, "").trim().to_string()
}

/// Pick the loopback endpoint mirroring the default output.
///
/// Preference order: the loopback whose name matches the default output's
/// with the `[Loopback]` tag stripped, then any loopback endpoint, then
/// the default output itself (hosts that capture render endpoints
/// directly). Fails only when no output endpoint exists at all.
pub fn pick_system_loopback(
    loopbacks: &[DeviceHandle],
    default_output: Option<&DeviceHandle>,
) -> Result<DeviceHandle, RecordError> {
    if let Some(output) = default_output {
        if let Some(exact) = loopbacks
            .iter()
            .find(|device| strip_loopback_tag(&device.name) == output.name)
        {
            log::info!("loopback matches default output: {}", exact.name);
            return Ok(exact.clone());
        }
    }

    if let Some(first) = loopbacks.first() {
        log::info!("using available loopback endpoint: {}", first.name);
        return Ok(first.clone());
    }

    match default_output {
        Some(output) => {
            log::info!("no loopback endpoint; capturing default output: {}", output.name);
            Ok(output.clone())
        }
        None => Err(RecordError::DeviceNotFound("no output devices present".into())),
    }
}

/// Resolve the recording microphone through `backend`.
pub fn resolve_microphone<B: CaptureBackend + ?Sized>(
    backend: &B,
) -> Result<DeviceHandle, RecordError> {
    pick_microphone(&backend.input_devices()?)
}

/// Resolve the system-audio capture endpoint through `backend`.
pub fn resolve_system_loopback<B: CaptureBackend + ?Sized>(
    backend: &B,
) -> Result<DeviceHandle, RecordError> {
    let loopbacks = backend.loopback_devices()?;
    let default_output = backend.default_output()?;
    pick_system_loopback(&loopbacks, default_output.as_ref())
}
