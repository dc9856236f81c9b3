//! services/ad_client/src/adapters/headless_page.rs
//!
//! An in-memory `HostPage` for environments without a document, such as the
//! command-line tool. It cannot observe visibility.

use ad_delivery_core::{
    ContainerRef, ElementHandle, HostPage, LinkActivation, NavigationOptions, PortError,
    PortResult,
};
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::stream::{BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Default)]
struct PageState {
    /// Container selector -> installed markup.
    containers: HashMap<String, Option<String>>,
    /// Rendered root -> the container it was installed in.
    roots: HashMap<ElementHandle, String>,
    listeners: HashMap<ElementHandle, mpsc::UnboundedSender<LinkActivation>>,
    navigations: Vec<(String, NavigationOptions)>,
    next_root: usize,
}

/// A page made of named containers whose content is plain markup.
#[derive(Default)]
pub struct HeadlessPage {
    state: Mutex<PageState>,
}

impl HeadlessPage {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Declares an empty container reachable by `selector`.
    pub fn add_container(&self, selector: &str) {
        self.state().containers.insert(selector.to_string(), None);
    }

    /// The markup currently installed in the container named `selector`.
    pub fn markup(&self, selector: &str) -> Option<String> {
        self.state().containers.get(selector).cloned().flatten()
    }

    /// Simulates a user activating a tracked link under `root`.
    /// Returns `false` when nothing intercepts links there.
    pub fn activate_link(&self, root: &ElementHandle, href: &str) -> bool {
        let state = self.state();
        let Some(listener) = state.listeners.get(root) else {
            return false;
        };
        listener
            .unbounded_send(LinkActivation {
                element: ElementHandle::new(format!("{} a", root.as_str())),
                href: href.to_string(),
            })
            .is_ok()
    }

    /// Every navigation the library performed, in order.
    pub fn navigations(&self) -> Vec<(String, NavigationOptions)> {
        self.state().navigations.clone()
    }
}

#[async_trait]
impl HostPage for HeadlessPage {
    fn resolve_container(&self, container: &ContainerRef) -> PortResult<ElementHandle> {
        let state = self.state();
        let selector = match container {
            ContainerRef::Selector(selector) => selector.as_str(),
            ContainerRef::Element(element) => element.as_str(),
        };
        if state.containers.contains_key(selector) {
            Ok(ElementHandle::new(selector))
        } else {
            Err(PortError::NotFound(format!("container '{}'", selector)))
        }
    }

    fn install_markup(&self, container: &ElementHandle, markup: &str) -> PortResult<ElementHandle> {
        let mut state = self.state();
        let Some(slot) = state.containers.get_mut(container.as_str()) else {
            return Err(PortError::NotFound(format!("container '{}'", container.as_str())));
        };
        *slot = Some(markup.to_string());

        // Replacing the content detaches whatever was rendered there before.
        let PageState {
            roots, listeners, ..
        } = &mut *state;
        roots.retain(|_, owner| owner.as_str() != container.as_str());
        // Dropping the sender ends the detached root's link stream.
        listeners.retain(|root, _| roots.contains_key(root));
        let root = ElementHandle::new(format!("{}#ad-{}", container.as_str(), state.next_root));
        state.next_root += 1;
        state.roots.insert(root.clone(), container.as_str().to_string());
        Ok(root)
    }

    fn intercept_links(
        &self,
        root: &ElementHandle,
        selector: &str,
    ) -> PortResult<BoxStream<'static, LinkActivation>> {
        let mut state = self.state();
        if !state.roots.contains_key(root) {
            return Err(PortError::NotFound(format!("element '{}'", root.as_str())));
        }
        debug!("Intercepting '{}' under {}", selector, root.as_str());
        let (sender, receiver) = mpsc::unbounded();
        state.listeners.insert(root.clone(), sender);
        Ok(receiver.boxed())
    }

    async fn navigate(&self, url: &str, options: NavigationOptions) -> PortResult<()> {
        self.state().navigations.push((url.to_string(), options));
        Ok(())
    }
}
