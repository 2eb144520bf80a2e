//! Image source abstraction for testability.
//!
//! The [`ImageSource`] trait hides how an image's filesystem reaches the local disk.
//! Production code uses [`BollardImageSource`], which talks to the Docker daemon,
//! while tests use `MockImageSource`.
//!
//! # Export
//!
//! Docker has no API that exports an image as a single flattened filesystem, so
//! [`BollardImageSource`] creates a stopped container from the image, streams
//! `docker export` into a temporary tarball and removes the container again.
//! Only regular files and directories are unpacked; device nodes, links and entries
//! escaping the destination are skipped.

use std::future::Future;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::ImageScanError;

/// 스캔 대상 이미지 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// 이미지 ID (`sha256:...`)
    pub id: String,
    /// `repo:tag` 목록. 태그 없는 이미지는 비어 있습니다.
    pub tags: Vec<String>,
}

impl ImageRef {
    pub fn new(id: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            id: id.into(),
            tags,
        }
    }

    pub fn is_untagged(&self) -> bool {
        self.tags.is_empty()
    }

    /// 로그용 12자리 짧은 ID
    pub fn short_id(&self) -> &str {
        let digest = self.id.strip_prefix("sha256:").unwrap_or(&self.id);
        digest.get(..12).unwrap_or(digest)
    }

    /// 사용자가 지정한 이름이 이 이미지를 가리키는지 판단합니다.
    ///
    /// 전체 ID, ID 접두어(다이제스트 부분), `repo:tag`, 태그를 생략한 `repo`(`latest`)를 받습니다.
    pub fn matches(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        if self.id == name {
            return true;
        }
        let digest = self.id.strip_prefix("sha256:").unwrap_or(&self.id);
        let wanted = name.strip_prefix("sha256:").unwrap_or(name);
        if wanted.len() >= MIN_ID_PREFIX && digest.starts_with(wanted) {
            return true;
        }
        self.tags
            .iter()
            .any(|tag| tag == name || tag.strip_suffix(":latest") == Some(name))
    }
}

/// ID 접두어로 인정하는 최소 길이
const MIN_ID_PREFIX: usize = 4;

/// Trait abstracting where images come from.
///
/// The trait is `Send + Sync + 'static` so a single source can be shared by every
/// scan task of the worker pool.
pub trait ImageSource: Send + Sync + 'static {
    /// Lists the images available for scanning.
    ///
    /// # Errors
    ///
    /// Returns `ImageScanError::DockerApi` if the listing call fails.
    fn list_images(&self) -> impl Future<Output = Result<Vec<ImageRef>, ImageScanError>> + Send;

    /// Writes the flattened filesystem of `image` below `dest`.
    ///
    /// `dest` exists and is empty. Everything the source leaves behind outside
    /// `dest` must be cleaned up before the future resolves, on success and on failure.
    ///
    /// # Errors
    ///
    /// - `ImageScanError::Export`: the image could not be exported
    /// - `ImageScanError::Io`: writing below `dest` failed
    fn export_filesystem(
        &self,
        image: &ImageRef,
        dest: &Path,
    ) -> impl Future<Output = Result<(), ImageScanError>> + Send;
}

/// Production [`ImageSource`] backed by the Docker daemon via `bollard`.
pub struct BollardImageSource {
    docker: Arc<bollard::Docker>,
}

/// 내보내기용으로 만드는 컨테이너의 명령. 실행되지 않으며 CMD 없는 이미지도 생성할 수 있게 합니다.
const EXPORT_PLACEHOLDER_CMD: &str = "jarsniff-export";

impl BollardImageSource {
    /// Connects to Docker using the default local socket.
    ///
    /// # Errors
    ///
    /// Returns `ImageScanError::DockerConnection` if the connection fails.
    pub fn connect_local() -> Result<Self, ImageScanError> {
        let docker = bollard::Docker::connect_with_local_defaults().map_err(|e| {
            ImageScanError::DockerConnection(format!("failed to connect to docker: {e}"))
        })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// Connects to Docker using a specific socket path.
    ///
    /// # Errors
    ///
    /// Returns `ImageScanError::DockerConnection` if the connection fails.
    pub fn connect_with_socket(socket_path: &str) -> Result<Self, ImageScanError> {
        let docker =
            bollard::Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| {
                    ImageScanError::DockerConnection(format!(
                        "failed to connect to docker at {socket_path}: {e}"
                    ))
                })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// 설정의 소켓 경로로 연결합니다. 빈 문자열이면 플랫폼 기본값을 씁니다.
    pub fn connect(socket_path: &str) -> Result<Self, ImageScanError> {
        if socket_path.is_empty() {
            Self::connect_local()
        } else {
            Self::connect_with_socket(socket_path)
        }
    }

    async fn create_export_container(
        &self,
        image: &ImageRef,
    ) -> Result<ExportContainer, ImageScanError> {
        use bollard::container::Config;

        let config = Config::<String> {
            image: Some(image.id.clone()),
            cmd: Some(vec![EXPORT_PLACEHOLDER_CMD.to_owned()]),
            ..Default::default()
        };
        let created = self
            .docker
            .create_container::<String, String>(None, config)
            .await
            .map_err(|e| ImageScanError::Export {
                image: image.id.clone(),
                reason: format!("create container failed: {e}"),
            })?;
        Ok(ExportContainer {
            docker: Arc::clone(&self.docker),
            id: Some(created.id),
        })
    }

    async fn export_to_file(
        &self,
        image: &ImageRef,
        container_id: &str,
        tarball: &Path,
    ) -> Result<(), ImageScanError> {
        let mut file = tokio::fs::File::create(tarball).await?;
        let mut stream = std::pin::pin!(self.docker.export_container(container_id));
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ImageScanError::Export {
                image: image.id.clone(),
                reason: format!("export stream failed: {e}"),
            })?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

/// 내보내기용 컨테이너 핸들
///
/// [`remove`](Self::remove) 없이 드롭되면 (내보내기 도중 취소 등) 현재 런타임에서
/// 삭제 태스크를 띄웁니다.
struct ExportContainer {
    docker: Arc<bollard::Docker>,
    id: Option<String>,
}

impl ExportContainer {
    fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    async fn remove(mut self) {
        if let Some(id) = self.id.take() {
            remove_container(&self.docker, &id).await;
        }
    }
}

impl Drop for ExportContainer {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(container_id = %id, "export interrupted, removing container");
                let docker = Arc::clone(&self.docker);
                handle.spawn(async move { remove_container(&docker, &id).await });
            }
            Err(_) => warn!(container_id = %id, "no runtime left to remove export container"),
        }
    }
}

async fn remove_container(docker: &bollard::Docker, container_id: &str) {
    use bollard::container::RemoveContainerOptions;

    let options = RemoveContainerOptions {
        force: true,
        ..Default::default()
    };
    if let Err(e) = docker.remove_container(container_id, Some(options)).await {
        warn!(container_id, error = %e, "failed to remove export container");
    }
}

impl ImageSource for BollardImageSource {
    async fn list_images(&self) -> Result<Vec<ImageRef>, ImageScanError> {
        use bollard::image::ListImagesOptions;

        let options = ListImagesOptions::<String> {
            all: false,
            ..Default::default()
        };
        let images = self
            .docker
            .list_images(Some(options))
            .await
            .map_err(|e| ImageScanError::DockerApi(format!("list images failed: {e}")))?;

        Ok(images
            .into_iter()
            .map(|summary| {
                let tags = summary
                    .repo_tags
                    .into_iter()
                    .filter(|tag| tag != "<none>:<none>")
                    .collect();
                ImageRef::new(summary.id, tags)
            })
            .collect())
    }

    async fn export_filesystem(&self, image: &ImageRef, dest: &Path) -> Result<(), ImageScanError> {
        // 추출 대상 디렉토리 밖에 두어 크롤 대상에 섞이지 않게 합니다.
        let tarball = tempfile::Builder::new()
            .prefix("jarsniff-export-")
            .suffix(".tar")
            .tempfile()?
            .into_temp_path();

        let container = self.create_export_container(image).await?;
        debug!(
            image = %image.short_id(),
            container_id = container.id(),
            "exporting container filesystem"
        );
        let exported = self.export_to_file(image, container.id(), &tarball).await;
        container.remove().await;
        exported?;

        let source = tarball.to_path_buf();
        let dest = dest.to_path_buf();
        let unpacked = tokio::task::spawn_blocking(move || unpack_filesystem(&source, &dest))
            .await
            .map_err(|e| ImageScanError::Task(e.to_string()))??;
        debug!(image = %image.short_id(), unpacked, "image filesystem unpacked");

        tarball.close()?;
        Ok(())
    }
}

/// 내보낸 tar에서 일반 파일과 디렉토리만 `dest` 아래로 풉니다.
///
/// 개별 엔트리 실패는 건너뜁니다. 풀어낸 엔트리 수를 돌려줍니다.
pub fn unpack_filesystem(tarball: &Path, dest: &Path) -> Result<usize, ImageScanError> {
    let file = std::fs::File::open(tarball)?;
    let mut archive = tar::Archive::new(BufReader::new(file));
    archive.set_preserve_permissions(false);
    archive.set_unpack_xattrs(false);

    let mut unpacked = 0;
    for entry in archive.entries()? {
        let mut entry = entry?;
        let kind = entry.header().entry_type();
        if !(kind.is_file() || kind.is_dir()) {
            continue;
        }
        let entry_path: PathBuf = entry.path().map(|p| p.into_owned()).unwrap_or_default();
        match entry.unpack_in(dest) {
            Ok(true) => unpacked += 1,
            Ok(false) => debug!(entry = %entry_path.display(), "entry escapes destination, skipped"),
            Err(e) => debug!(entry = %entry_path.display(), error = %e, "failed to unpack entry"),
        }
    }
    Ok(unpacked)
}

/// 테스트용 이미지 소스. 이미지별 파일 목록을 디스크에 써서 "추출"합니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockImageSource {
    /// list_images 호출 시 반환할 이미지와 각 이미지의 파일 (상대 경로, 내용)
    pub images: Vec<(ImageRef, Vec<(String, Vec<u8>)>)>,
    /// 추출에 실패할 이미지 ID
    pub failing: Vec<String>,
    /// 목록 조회 실패 시뮬레이션
    pub fail_list: bool,
    /// 추출이 끝나지 않는 이미지 ID
    pub stalled: Vec<String>,
}

#[cfg(test)]
impl MockImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, image: ImageRef, files: Vec<(&str, Vec<u8>)>) -> Self {
        let files = files
            .into_iter()
            .map(|(path, bytes)| (path.to_owned(), bytes))
            .collect();
        self.images.push((image, files));
        self
    }

    pub fn with_failing(mut self, id: &str) -> Self {
        self.failing.push(id.to_owned());
        self
    }

    pub fn with_stalled(mut self, id: &str) -> Self {
        self.stalled.push(id.to_owned());
        self
    }
}

#[cfg(test)]
impl ImageSource for MockImageSource {
    async fn list_images(&self) -> Result<Vec<ImageRef>, ImageScanError> {
        if self.fail_list {
            return Err(ImageScanError::DockerApi("mock list failure".to_owned()));
        }
        Ok(self.images.iter().map(|(image, _)| image.clone()).collect())
    }

    async fn export_filesystem(&self, image: &ImageRef, dest: &Path) -> Result<(), ImageScanError> {
        if self.stalled.contains(&image.id) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(&image.id) {
            return Err(ImageScanError::Export {
                image: image.id.clone(),
                reason: "mock export failure".to_owned(),
            });
        }
        let files = self
            .images
            .iter()
            .find(|(candidate, _)| candidate.id == image.id)
            .map(|(_, files)| files.clone())
            .ok_or_else(|| ImageScanError::NotFound(image.id.clone()))?;
        for (relative, bytes) in files {
            let path = dest.join(relative);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, bytes).await?;
        }
        Ok(())
    }
}
