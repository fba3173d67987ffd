pub(super) const INDEX_HTML: &str = r#"<!DOCTYPE html>
  <html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0"/>
    <title>basemapper</title>
    <link
      rel="stylesheet"
      href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css"
      integrity="sha256-p4NxAoJBhIIN+hmNHrzRCf9tD/miZyoHS5obTRR9BMY="
      crossorigin=""
    />
    <style>
      html, body { height: 100%; margin: 0; padding: 0; }
      #map { height: 100%; width: 100%; }
      .panel {
        position: absolute;
        z-index: 1000;
        background: white;
        padding: 6px;
        border-radius: 4px;
        box-shadow: 0 1px 4px rgba(0,0,0,0.3);
        font: 13px sans-serif;
      }
      #controls { top: 12px; left: 50px; }
      #info { top: 12px; right: 12px; min-width: 200px; }
      .layer-controls button { margin: 2px; }
      .layer-controls button.active { background: #2b83ba; color: white; }
    </style>
  </head>
  <body>
    <div id="controls" class="panel">
      <div class="layer-controls" id="baseButtons"></div>
      <div class="layer-controls" id="overlayButtons"></div>
      <div class="layer-controls"><button id="clearVectors">Clear overlays</button></div>
    </div>
    <div id="info" class="panel"><b>Viewer</b><div id="statusText">...</div><div id="attached"></div></div>
    <div id="map"></div>

    <script
      src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"
      integrity="sha256-20nQCchB9co0qIjJZRGuk2/Z9VM+kNiyxNV1lvTlZBo="
      crossorigin=""
    ></script>

    <script>
      const map = L.map('map').setView([54.74, 56.0], 7);
      L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
        maxZoom: 19,
        attribution: '&copy; <a href="https://www.openstreetmap.org/copyright">OpenStreetMap</a> contributors'
      }).addTo(map);

      let lastFit = 0;
      let extentBox = null;

      // EPSG:3857 metres to [lat, lng]
      function toLatLng(x, y) {
        const lng = x / 6378137.0 * 180.0 / Math.PI;
        const lat = (2 * Math.atan(Math.exp(y / 6378137.0)) - Math.PI / 2) * 180.0 / Math.PI;
        return [lat, lng];
      }

      function button(parent, key, label, onClick) {
        const btn = document.createElement('button');
        btn.id = key;
        btn.textContent = label;
        btn.addEventListener('click', onClick);
        parent.appendChild(btn);
      }

      async function post(method, url) {
        const res = await fetch(url, { method });
        render(await res.json());
      }

      function render({ status }) {
        document.getElementById('statusText').textContent = status.text || '...';
        document.querySelectorAll('.layer-controls button').forEach(btn => {
          const active = btn.id === status.active_base || status.active_overlays.includes(btn.id);
          btn.classList.toggle('active', active);
        });
      }

      async function refresh() {
        const res = await fetch('/state');
        const { status, viewport } = await res.json();
        render({ status });
        document.getElementById('attached').textContent =
          viewport.layers.map(l => `${l.key} (${l.role})`).join(', ');

        if (viewport.last_fit && viewport.fit_count !== lastFit) {
          lastFit = viewport.fit_count;
          const e = viewport.last_fit.extent;
          const bounds = L.latLngBounds(toLatLng(e.minx, e.miny), toLatLng(e.maxx, e.maxy));
          const [t, r, b, l] = viewport.last_fit.options.padding;
          if (extentBox) map.removeLayer(extentBox);
          extentBox = L.rectangle(bounds, { color: '#d7191c', weight: 1, fill: false }).addTo(map);
          map.flyToBounds(bounds, {
            paddingTopLeft: [l, t],
            paddingBottomRight: [r, b],
            maxZoom: viewport.last_fit.options.max_zoom,
            duration: viewport.last_fit.options.duration_ms / 1000,
          });
        }
      }

      async function init() {
        const layers = await (await fetch('/layers')).json();
        const bases = document.getElementById('baseButtons');
        const overlays = document.getElementById('overlayButtons');
        layers.forEach(({ key, label, role }) => {
          if (role === 'base') {
            button(bases, key, label, () => post('POST', `/base/${key}`));
          } else {
            button(overlays, key, label, () => post('POST', `/overlays/${key}`));
          }
        });
        document.getElementById('clearVectors')
          .addEventListener('click', () => post('DELETE', '/overlays'));

        await refresh();
        setInterval(refresh, 1000);
      }

      init();
    </script>
  </body>
</html>
"#;
