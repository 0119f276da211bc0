use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, BundleError};

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

/// Captured output of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Seek to `seconds` before reading the input
    pub fn seek(self, seconds: f64) -> Self {
        self.arg("-ss").arg(format!("{:.3}", seconds))
    }

    /// Limit output length to `seconds`
    pub fn duration(self, seconds: f64) -> Self {
        self.arg("-t").arg(format!("{:.3}", seconds))
    }

    /// Set video codec
    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    /// Set audio codec
    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Disable video
    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    /// Disable audio
    pub fn no_audio(self) -> Self {
        self.arg("-an")
    }

    /// Add audio filter
    pub fn audio_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-af").arg(filter)
    }

    /// Execute the command, failing on a non-zero exit status
    pub async fn execute(&self) -> Result<()> {
        self.execute_capture().await.map(|_| ())
    }

    /// Execute the command and hand back what it printed
    pub async fn execute_capture(&self) -> Result<CommandOutput> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| BundleError::Media(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            return Err(BundleError::Media(format!(
                "{} failed: {}",
                self.description,
                stderr
            )));
        }

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr,
        })
    }
}

/// Builder for the ffmpeg/ffprobe invocations the pipeline needs
pub struct MediaCommandBuilder {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new<S1: Into<String>, S2: Into<String>>(ffmpeg_path: S1, ffprobe_path: S2) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Build container duration probe
    pub fn probe_duration<P: AsRef<Path>>(&self, input: P) -> MediaCommand {
        MediaCommand::new(&self.ffprobe_path, "Duration probe")
            .args(["-v", "error", "-show_entries", "format=duration", "-of", "default=noprint_wrappers=1:nokey=1"])
            .output(input)
    }

    /// Build silence detection pass; results arrive on stderr
    pub fn detect_silence<P: AsRef<Path>>(&self, input: P, noise_db: f64, min_silence: f64) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Silence detection")
            .arg("-hide_banner")
            .input(input)
            .no_video()
            .audio_filter(format!("silencedetect=noise={}dB:d={}", noise_db, min_silence))
            .args(["-f", "null", "-"])
    }

    /// Build segment clip extraction
    pub fn extract_clip<P: AsRef<Path>>(
        &self,
        input: P,
        start: f64,
        duration: f64,
        output: P,
        additional_options: &[String],
    ) -> MediaCommand {
        let mut cmd = MediaCommand::new(&self.ffmpeg_path, "Clip extraction")
            .overwrite()
            .seek(start)
            .input(input)
            .duration(duration)
            .video_codec("libx264")
            .audio_codec("aac")
            .args(["-movflags", "+faststart", "-pix_fmt", "yuv420p"]);

        // Add user-specified additional options
        for option in additional_options {
            cmd = cmd.arg(option);
        }

        cmd.output(output)
    }

    /// Build segment audio extraction
    pub fn extract_audio<P: AsRef<Path>>(
        &self,
        input: P,
        start: f64,
        duration: f64,
        output: P,
    ) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Audio extraction")
            .overwrite()
            .seek(start)
            .input(input)
            .duration(duration)
            .no_video()
            .audio_codec("libmp3lame")
            .args(["-q:a", "2"])
            .output(output)
    }

    /// Build single-frame thumbnail extraction
    pub fn extract_thumbnail<P: AsRef<Path>>(&self, input: P, at: f64, output: P) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Thumbnail extraction")
            .overwrite()
            .seek(at)
            .input(input)
            .no_audio()
            .args(["-frames:v", "1", "-q:v", "2"])
            .output(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_command_seeks_before_input() {
        let builder = MediaCommandBuilder::new("ffmpeg", "ffprobe");
        let cmd = builder.extract_clip(
            Path::new("in.mp4"),
            60.5,
            89.5,
            Path::new("out/2.mp4"),
            &["-crf".to_string(), "23".to_string()],
        );

        let ss = cmd.args.iter().position(|a| a == "-ss").unwrap();
        let input = cmd.args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < input);
        assert_eq!(cmd.args[ss + 1], "60.500");
        assert!(cmd.args.contains(&"-crf".to_string()));
        assert_eq!(cmd.args.last().unwrap(), "out/2.mp4");
    }

    #[test]
    fn test_silence_command_uses_null_muxer() {
        let builder = MediaCommandBuilder::new("ffmpeg", "ffprobe");
        let cmd = builder.detect_silence(Path::new("talk.mp4"), -30.0, 0.5);

        assert!(cmd.args.contains(&"silencedetect=noise=-30dB:d=0.5".to_string()));
        assert_eq!(&cmd.args[cmd.args.len() - 3..], &["-f", "null", "-"]);
    }

    #[tokio::test]
    async fn test_missing_binary_is_media_error() {
        let cmd = MediaCommand::new("definitely-not-a-real-binary-xyz", "Nothing");
        assert!(matches!(cmd.execute().await, Err(BundleError::Media(_))));
    }
}
