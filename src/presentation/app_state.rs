// Application state for HTTP handlers
use crate::application::kpi_service::KpiService;
use crate::domain::period::CalendarResolver;

#[derive(Clone)]
pub struct AppState {
    pub kpi_service: KpiService,
    pub resolver: CalendarResolver,
}
