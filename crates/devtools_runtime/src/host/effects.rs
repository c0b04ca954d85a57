//! Post-commit effect execution for the instance registry.

use leptos::logging;

use super::AppHost;
use crate::reducer::HostEffect;

pub(super) fn run_host_effect(host: &AppHost, effect: HostEffect) {
    match effect {
        HostEffect::PersistOpenApps => host.schedule_persist(),
        HostEffect::RemoveMinimized(instance_id) => {
            host.inner.minimized.restore(&instance_id);
        }
        HostEffect::ClearMinimized => host.inner.minimized.clear_all(),
        HostEffect::RelinkMinimized(instances) => {
            let open = host.inner.state.borrow().apps.len();
            logging::log!(
                "devtools session restored: {open} open, {} minimized",
                instances.len()
            );
            host.inner.minimized.relink(instances);
        }
    }
}
