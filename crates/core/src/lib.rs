pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod model_resolver;
    pub mod region;
    pub mod settings;
}

pub mod capture {
    pub mod capture_session_manager;
    pub mod domain {
        pub mod camera_device;
        pub mod capture_session;
        pub mod frame_sink;
    }
    pub mod infrastructure;
}

pub mod detection {
    pub mod domain {
        pub mod face_detector;
    }
    pub mod infrastructure;
}

pub mod overlay {
    pub mod overlay_presenter;
    pub mod domain {
        pub mod coordinate_mapper;
        pub mod display_surface;
        pub mod overlay_shape;
    }
    pub mod infrastructure;
}

pub mod snapshot {
    pub mod domain {
        pub mod snapshot_writer;
    }
    pub mod infrastructure {
        pub mod png_snapshot_writer;
    }
}

pub mod pipeline {
    pub mod face_overlay_use_case;
    pub mod pipeline_executor;
    pub mod pipeline_logger;
    pub mod pipeline_state;
    pub mod infrastructure {
        pub mod threaded_pipeline_executor;
    }
}
